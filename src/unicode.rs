use icu_normalizer::properties::{
    CanonicalCompositionBorrowed, CanonicalDecompositionBorrowed, Decomposed,
};
use unicode_properties::GeneralCategory as UGeneralCategory;

/// A Unicode general category in harfbuzz order.
///
/// The numeric value is stored in the low five bits of a glyph's
/// Unicode properties.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum GeneralCategory {
    Control = 0,
    Format,
    Unassigned,
    PrivateUse,
    Surrogate,
    LowercaseLetter,
    ModifierLetter,
    OtherLetter,
    TitlecaseLetter,
    UppercaseLetter,
    SpacingMark,
    EnclosingMark,
    NonspacingMark,
    DecimalNumber,
    LetterNumber,
    OtherNumber,
    ConnectorPunctuation,
    DashPunctuation,
    ClosePunctuation,
    FinalPunctuation,
    InitialPunctuation,
    OtherPunctuation,
    OpenPunctuation,
    CurrencySymbol,
    ModifierSymbol,
    MathSymbol,
    OtherSymbol,
    LineSeparator,
    ParagraphSeparator,
    SpaceSeparator,
}

impl GeneralCategory {
    pub(crate) fn from_u8(n: u8) -> Self {
        use GeneralCategory::*;

        const ALL: [GeneralCategory; 30] = [
            Control, Format, Unassigned, PrivateUse, Surrogate,
            LowercaseLetter, ModifierLetter, OtherLetter, TitlecaseLetter, UppercaseLetter,
            SpacingMark, EnclosingMark, NonspacingMark,
            DecimalNumber, LetterNumber, OtherNumber,
            ConnectorPunctuation, DashPunctuation, ClosePunctuation, FinalPunctuation,
            InitialPunctuation, OtherPunctuation, OpenPunctuation,
            CurrencySymbol, ModifierSymbol, MathSymbol, OtherSymbol,
            LineSeparator, ParagraphSeparator, SpaceSeparator,
        ];

        ALL.get(usize::from(n)).copied().unwrap_or(Unassigned)
    }

    #[inline]
    pub(crate) fn is_mark(self) -> bool {
        matches!(
            self,
            GeneralCategory::SpacingMark
                | GeneralCategory::EnclosingMark
                | GeneralCategory::NonspacingMark
        )
    }
}

impl From<UGeneralCategory> for GeneralCategory {
    fn from(gc: UGeneralCategory) -> Self {
        use GeneralCategory as G;
        use UGeneralCategory as U;

        match gc {
            U::UppercaseLetter => G::UppercaseLetter,
            U::LowercaseLetter => G::LowercaseLetter,
            U::TitlecaseLetter => G::TitlecaseLetter,
            U::ModifierLetter => G::ModifierLetter,
            U::OtherLetter => G::OtherLetter,
            U::NonspacingMark => G::NonspacingMark,
            U::SpacingMark => G::SpacingMark,
            U::EnclosingMark => G::EnclosingMark,
            U::DecimalNumber => G::DecimalNumber,
            U::LetterNumber => G::LetterNumber,
            U::OtherNumber => G::OtherNumber,
            U::ConnectorPunctuation => G::ConnectorPunctuation,
            U::DashPunctuation => G::DashPunctuation,
            U::OpenPunctuation => G::OpenPunctuation,
            U::ClosePunctuation => G::ClosePunctuation,
            U::InitialPunctuation => G::InitialPunctuation,
            U::FinalPunctuation => G::FinalPunctuation,
            U::OtherPunctuation => G::OtherPunctuation,
            U::MathSymbol => G::MathSymbol,
            U::CurrencySymbol => G::CurrencySymbol,
            U::ModifierSymbol => G::ModifierSymbol,
            U::OtherSymbol => G::OtherSymbol,
            U::SpaceSeparator => G::SpaceSeparator,
            U::LineSeparator => G::LineSeparator,
            U::ParagraphSeparator => G::ParagraphSeparator,
            U::Control => G::Control,
            U::Format => G::Format,
            U::Surrogate => G::Surrogate,
            U::PrivateUse => G::PrivateUse,
            U::Unassigned => G::Unassigned,
        }
    }
}

/// Space fallback types, stored in the high byte of a space's Unicode properties.
pub(crate) mod space {
    pub const NOT_SPACE: u8 = 0;
    pub const SPACE_EM: u8 = 1;
    pub const SPACE_EM_2: u8 = 2;
    pub const SPACE_EM_3: u8 = 3;
    pub const SPACE_EM_4: u8 = 4;
    pub const SPACE_EM_5: u8 = 5;
    pub const SPACE_EM_6: u8 = 6;
    pub const SPACE_EM_16: u8 = 16;
    pub const SPACE_4_EM_18: u8 = 17; // 4/18th of an EM!
    pub const SPACE: u8 = 18;
    pub const SPACE_FIGURE: u8 = 19;
    pub const SPACE_PUNCTUATION: u8 = 20;
    pub const SPACE_NARROW: u8 = 21;
}

pub(crate) trait CharExt {
    fn general_category(self) -> GeneralCategory;
    fn combining_class(self) -> u8;
    fn space_fallback(self) -> u8;
    fn is_default_ignorable(self) -> bool;
    fn mirrored(self) -> Option<char>;
    fn is_variation_selector(self) -> bool;
}

impl CharExt for char {
    #[inline]
    fn general_category(self) -> GeneralCategory {
        GeneralCategory::from(unicode_properties::UnicodeGeneralCategory::general_category(self))
    }

    #[inline]
    fn combining_class(self) -> u8 {
        unicode_ccc::get_canonical_combining_class(self) as u8
    }

    fn space_fallback(self) -> u8 {
        use space::*;

        // All GC=Zs chars that can use a fallback.
        match self {
            '\u{0020}' => SPACE,             // SPACE
            '\u{00A0}' => SPACE,             // NO-BREAK SPACE
            '\u{2000}' => SPACE_EM_2,        // EN QUAD
            '\u{2001}' => SPACE_EM,          // EM QUAD
            '\u{2002}' => SPACE_EM_2,        // EN SPACE
            '\u{2003}' => SPACE_EM,          // EM SPACE
            '\u{2004}' => SPACE_EM_3,        // THREE-PER-EM SPACE
            '\u{2005}' => SPACE_EM_4,        // FOUR-PER-EM SPACE
            '\u{2006}' => SPACE_EM_6,        // SIX-PER-EM SPACE
            '\u{2007}' => SPACE_FIGURE,      // FIGURE SPACE
            '\u{2008}' => SPACE_PUNCTUATION, // PUNCTUATION SPACE
            '\u{2009}' => SPACE_EM_5,        // THIN SPACE
            '\u{200A}' => SPACE_EM_16,       // HAIR SPACE
            '\u{202F}' => SPACE_NARROW,      // NARROW NO-BREAK SPACE
            '\u{205F}' => SPACE_4_EM_18,     // MEDIUM MATHEMATICAL SPACE
            '\u{3000}' => SPACE_EM,          // IDEOGRAPHIC SPACE
            _ => NOT_SPACE,                  // OGHAM SPACE MARK
        }
    }

    // Default_Ignorable codepoints:
    //
    // Note: While U+115F, U+1160, U+3164 and U+FFA0 are Default_Ignorable,
    // we do NOT want to hide them, as the way Uniscribe has implemented them
    // is with regular spacing glyphs, and that's the way fonts are made to work.
    // As such, we make exceptions for those four.
    // Also ignoring U+1BCA0..1BCA3. https://github.com/harfbuzz/harfbuzz/issues/503
    fn is_default_ignorable(self) -> bool {
        let ch = u32::from(self);
        let plane = ch >> 16;
        if plane == 0 {
            // BMP
            let page = ch >> 8;
            match page {
                0x00 => ch == 0x00AD,
                0x03 => ch == 0x034F,
                0x06 => ch == 0x061C,
                0x17 => (0x17B4..=0x17B5).contains(&ch),
                0x18 => (0x180B..=0x180F).contains(&ch),
                0x20 => (0x200B..=0x200F).contains(&ch) ||
                        (0x202A..=0x202E).contains(&ch) ||
                        (0x2060..=0x206F).contains(&ch),
                0xFE => (0xFE00..=0xFE0F).contains(&ch) || ch == 0xFEFF,
                0xFF => (0xFFF0..=0xFFF8).contains(&ch),
                _ => false,
            }
        } else {
            // Other planes
            match plane {
                0x01 => (0x1D173..=0x1D17A).contains(&ch),
                0x0E => (0xE0000..=0xE0FFF).contains(&ch),
                _ => false,
            }
        }
    }

    #[inline]
    fn mirrored(self) -> Option<char> {
        unicode_bidi_mirroring::get_mirrored(self)
    }

    #[inline]
    fn is_variation_selector(self) -> bool {
        // U+180B..180D, U+180F MONGOLIAN FREE VARIATION SELECTORs are handled in the
        // Mongolian shaper.
        matches!(u32::from(self), 0xFE00..=0xFE0F | 0xE0100..=0xE01EF)
    }
}

/// Splits a character into its canonical 1:2 decomposition.
pub(crate) fn decompose(ab: char) -> Option<(char, char)> {
    match CanonicalDecompositionBorrowed::new().decompose(ab) {
        Decomposed::Default => None,
        // Singleton decompositions are reported with a zero second half,
        // which the normalizer treats as "decomposes to one character".
        Decomposed::Singleton(a) => Some((a, '\0')),
        Decomposed::Expansion(a, b) => Some((a, b)),
    }
}

/// Composes two characters canonically.
pub(crate) fn compose(a: char, b: char) -> Option<char> {
    CanonicalCompositionBorrowed::new().compose(a, b)
}
