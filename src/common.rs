use std::ops::{Bound, RangeBounds};
use std::str::FromStr;

pub use ttf_parser::Tag;

/// Defines the direction in which text is to be read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Initial, unset direction.
    #[default]
    Invalid,
    /// Text is set horizontally from left to right.
    LeftToRight,
    /// Text is set horizontally from right to left.
    RightToLeft,
    /// Text is set vertically from top to bottom.
    TopToBottom,
    /// Text is set vertically from bottom to top.
    BottomToTop,
}

impl Direction {
    #[inline]
    pub(crate) fn is_horizontal(self) -> bool {
        matches!(self, Direction::LeftToRight | Direction::RightToLeft)
    }

    #[inline]
    pub(crate) fn is_vertical(self) -> bool {
        matches!(self, Direction::TopToBottom | Direction::BottomToTop)
    }

    #[inline]
    pub(crate) fn is_forward(self) -> bool {
        matches!(self, Direction::LeftToRight | Direction::TopToBottom)
    }

    #[inline]
    pub(crate) fn is_backward(self) -> bool {
        matches!(self, Direction::RightToLeft | Direction::BottomToTop)
    }

    #[inline]
    pub(crate) fn reverse(self) -> Self {
        match self {
            Direction::LeftToRight => Direction::RightToLeft,
            Direction::RightToLeft => Direction::LeftToRight,
            Direction::TopToBottom => Direction::BottomToTop,
            Direction::BottomToTop => Direction::TopToBottom,
            Direction::Invalid => Direction::Invalid,
        }
    }

    /// Returns the natural horizontal direction of a script.
    ///
    /// `None` for scripts that can be written either way and for
    /// Common, Inherited and Unknown.
    pub fn from_script(script: Script) -> Option<Self> {
        // https://docs.google.com/spreadsheets/d/1Y90M0Ie3MUJ6UVCRDOypOtijlMDLNNyyLk36T6iMu0o

        match script {
            // Unicode-1.1 additions
            script::ARABIC |
            script::HEBREW |

            // Unicode-3.0 additions
            script::SYRIAC |
            script::THAANA |

            // Unicode-4.0 additions
            script::CYPRIOT |

            // Unicode-4.1 additions
            script::KHAROSHTHI |

            // Unicode-5.0 additions
            script::PHOENICIAN |
            script::NKO |

            // Unicode-5.1 additions
            script::LYDIAN |

            // Unicode-5.2 additions
            script::AVESTAN |
            script::IMPERIAL_ARAMAIC |
            script::INSCRIPTIONAL_PAHLAVI |
            script::INSCRIPTIONAL_PARTHIAN |
            script::OLD_SOUTH_ARABIAN |
            script::OLD_TURKIC |
            script::SAMARITAN |

            // Unicode-6.0 additions
            script::MANDAIC |

            // Unicode-6.1 additions
            script::MEROITIC_CURSIVE |
            script::MEROITIC_HIEROGLYPHS |

            // Unicode-7.0 additions
            script::MANICHAEAN |
            script::MENDE_KIKAKUI |
            script::NABATAEAN |
            script::OLD_NORTH_ARABIAN |
            script::PALMYRENE |
            script::PSALTER_PAHLAVI |

            // Unicode-8.0 additions
            script::HATRAN |

            // Unicode-9.0 additions
            script::ADLAM |

            // Unicode-11.0 additions
            script::HANIFI_ROHINGYA |
            script::OLD_SOGDIAN |
            script::SOGDIAN |

            // Unicode-12.0 additions
            script::ELYMAIC => Some(Direction::RightToLeft),

            // https://github.com/harfbuzz/harfbuzz/issues/1000
            script::OLD_HUNGARIAN |
            script::OLD_ITALIC |
            script::RUNIC => None,

            script::COMMON | script::INHERITED | script::UNKNOWN => None,

            _ => Some(Direction::LeftToRight),
        }
    }
}

impl FromStr for Direction {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("invalid direction");
        }

        // harfbuzz also matches only the first letter.
        match s.as_bytes()[0].to_ascii_lowercase() {
            b'l' => Ok(Direction::LeftToRight),
            b'r' => Ok(Direction::RightToLeft),
            b't' => Ok(Direction::TopToBottom),
            b'b' => Ok(Direction::BottomToTop),
            _ => Err("invalid direction"),
        }
    }
}

/// A text language.
///
/// Stored as a lowercase BCP 47 string.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Language(String);

impl Language {
    /// Returns the language as a string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for Language {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("invalid language");
        }

        if !s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_') {
            return Err("invalid language");
        }

        Ok(Language(s.to_ascii_lowercase().replace('_', "-")))
    }
}

// In harfbuzz, despite having `hb_script_t`, script can actually have any tag.
// So we're doing the same.
// The only difference is that `Script` cannot be set to `HB_SCRIPT_INVALID`.
/// A text script.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Script(pub(crate) Tag);

impl Script {
    #[inline]
    pub(crate) const fn from_bytes(bytes: &[u8; 4]) -> Self {
        Script(Tag::from_bytes(bytes))
    }

    /// Converts an ISO 15924 script tag to a corresponding `Script`.
    pub fn from_iso15924_tag(tag: Tag) -> Option<Script> {
        if tag.is_null() {
            return None;
        }

        // Be lenient, adjust case (one capital letter followed by three small letters).
        let tag = Tag((tag.as_u32() & 0xDFDFDFDF) | 0x00202020);

        match &tag.to_bytes() {
            // These graduated from the 'Q' private-area codes, but
            // the old code is still aliased by Unicode, and the Qaai
            // one in use by ICU.
            b"Qaai" => return Some(script::INHERITED),
            b"Qaac" => return Some(script::COPTIC),

            // Script variants from https://unicode.org/iso15924/
            b"Cyrs" => return Some(script::CYRILLIC),
            b"Latf" | b"Latg" => return Some(script::LATIN),
            b"Syre" | b"Syrj" | b"Syrn" => return Some(script::SYRIAC),

            _ => {}
        }

        if tag.as_u32() & 0xE0E0E0E0 == 0x40606060 {
            Some(Script(tag))
        } else {
            Some(script::UNKNOWN)
        }
    }

    /// Returns the script of a character.
    pub fn from_char(c: char) -> Script {
        use unicode_script::UnicodeScript;

        let name = c.script().short_name();
        Script::from_iso15924_tag(Tag::from_bytes_lossy(name.as_bytes()))
            .unwrap_or(script::UNKNOWN)
    }

    /// Returns script's tag.
    #[inline]
    pub fn tag(&self) -> Tag {
        self.0
    }
}

impl FromStr for Script {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = Tag::from_bytes_lossy(s.as_bytes());
        Script::from_iso15924_tag(tag).ok_or("invalid script")
    }
}

/// Predefined scripts.
pub mod script {
    #![allow(missing_docs)]

    use crate::Script;

    pub const COMMON: Script                    = Script::from_bytes(b"Zyyy");
    pub const INHERITED: Script                 = Script::from_bytes(b"Zinh");
    pub const UNKNOWN: Script                   = Script::from_bytes(b"Zzzz");

    pub const ADLAM: Script                     = Script::from_bytes(b"Adlm");
    pub const ARABIC: Script                    = Script::from_bytes(b"Arab");
    pub const ARMENIAN: Script                  = Script::from_bytes(b"Armn");
    pub const AVESTAN: Script                   = Script::from_bytes(b"Avst");
    pub const BENGALI: Script                   = Script::from_bytes(b"Beng");
    pub const COPTIC: Script                    = Script::from_bytes(b"Copt");
    pub const CYPRIOT: Script                   = Script::from_bytes(b"Cprt");
    pub const CYRILLIC: Script                  = Script::from_bytes(b"Cyrl");
    pub const DEVANAGARI: Script                = Script::from_bytes(b"Deva");
    pub const ELYMAIC: Script                   = Script::from_bytes(b"Elym");
    pub const GEORGIAN: Script                  = Script::from_bytes(b"Geor");
    pub const GREEK: Script                     = Script::from_bytes(b"Grek");
    pub const HAN: Script                       = Script::from_bytes(b"Hani");
    pub const HANGUL: Script                    = Script::from_bytes(b"Hang");
    pub const HANIFI_ROHINGYA: Script           = Script::from_bytes(b"Rohg");
    pub const HATRAN: Script                    = Script::from_bytes(b"Hatr");
    pub const HEBREW: Script                    = Script::from_bytes(b"Hebr");
    pub const IMPERIAL_ARAMAIC: Script          = Script::from_bytes(b"Armi");
    pub const INSCRIPTIONAL_PAHLAVI: Script     = Script::from_bytes(b"Phli");
    pub const INSCRIPTIONAL_PARTHIAN: Script    = Script::from_bytes(b"Prti");
    pub const KHAROSHTHI: Script                = Script::from_bytes(b"Khar");
    pub const LAO: Script                       = Script::from_bytes(b"Laoo");
    pub const LATIN: Script                     = Script::from_bytes(b"Latn");
    pub const LYDIAN: Script                    = Script::from_bytes(b"Lydi");
    pub const MANDAIC: Script                   = Script::from_bytes(b"Mand");
    pub const MANICHAEAN: Script                = Script::from_bytes(b"Mani");
    pub const MENDE_KIKAKUI: Script             = Script::from_bytes(b"Mend");
    pub const MEROITIC_CURSIVE: Script          = Script::from_bytes(b"Merc");
    pub const MEROITIC_HIEROGLYPHS: Script      = Script::from_bytes(b"Mero");
    pub const MONGOLIAN: Script                 = Script::from_bytes(b"Mong");
    pub const NABATAEAN: Script                 = Script::from_bytes(b"Nbat");
    pub const NKO: Script                       = Script::from_bytes(b"Nkoo");
    pub const OGHAM: Script                     = Script::from_bytes(b"Ogam");
    pub const OLD_HUNGARIAN: Script             = Script::from_bytes(b"Hung");
    pub const OLD_ITALIC: Script                = Script::from_bytes(b"Ital");
    pub const OLD_NORTH_ARABIAN: Script         = Script::from_bytes(b"Narb");
    pub const OLD_SOGDIAN: Script               = Script::from_bytes(b"Sogo");
    pub const OLD_SOUTH_ARABIAN: Script         = Script::from_bytes(b"Sarb");
    pub const OLD_TURKIC: Script                = Script::from_bytes(b"Orkh");
    pub const PALMYRENE: Script                 = Script::from_bytes(b"Palm");
    pub const PHOENICIAN: Script                = Script::from_bytes(b"Phnx");
    pub const PSALTER_PAHLAVI: Script           = Script::from_bytes(b"Phlp");
    pub const RUNIC: Script                     = Script::from_bytes(b"Runr");
    pub const SAMARITAN: Script                 = Script::from_bytes(b"Samr");
    pub const SOGDIAN: Script                   = Script::from_bytes(b"Sogd");
    pub const SYRIAC: Script                    = Script::from_bytes(b"Syrc");
    pub const THAANA: Script                    = Script::from_bytes(b"Thaa");
    pub const THAI: Script                      = Script::from_bytes(b"Thai");
    pub const TIBETAN: Script                   = Script::from_bytes(b"Tibt");
}

/// Feature tags used by the pipeline itself.
pub mod feature {
    #![allow(missing_docs)]

    use crate::Tag;

    pub const GLYPH_COMPOSITION_DECOMPOSITION: Tag = Tag::from_bytes(b"ccmp");
    pub const STANDARD_LIGATURES: Tag = Tag::from_bytes(b"liga");
    pub const LOCALIZED_FORMS: Tag = Tag::from_bytes(b"locl");
    pub const MARK_POSITIONING: Tag = Tag::from_bytes(b"mark");
    pub const MARK_TO_MARK_POSITIONING: Tag = Tag::from_bytes(b"mkmk");
    pub const REQUIRED_LIGATURES: Tag = Tag::from_bytes(b"rlig");

    pub const CONTEXTUAL_ALTERNATES: Tag = Tag::from_bytes(b"calt");
    pub const CONTEXTUAL_LIGATURES: Tag = Tag::from_bytes(b"clig");
    pub const CURSIVE_POSITIONING: Tag = Tag::from_bytes(b"curs");
    pub const KERNING: Tag = Tag::from_bytes(b"kern");
    pub const REQUIRED_CONTEXTUAL_ALTERNATES: Tag = Tag::from_bytes(b"rclt");

    pub const ALTERNATE_VERTICAL_METRICS: Tag = Tag::from_bytes(b"valt");
    pub const VERTICAL_WRITING: Tag = Tag::from_bytes(b"vert");
    pub const VERTICAL_KERNING: Tag = Tag::from_bytes(b"vkrn");
    pub const PROPORTIONAL_ALTERNATE_VERTICAL_METRICS: Tag = Tag::from_bytes(b"vpal");
    pub const VERTICAL_ALTERNATES_AND_ROTATION: Tag = Tag::from_bytes(b"vrt2");

    pub const LEFT_TO_RIGHT_ALTERNATES: Tag = Tag::from_bytes(b"ltra");
    pub const LEFT_TO_RIGHT_MIRRORED_FORMS: Tag = Tag::from_bytes(b"ltrm");
    pub const RIGHT_TO_LEFT_ALTERNATES: Tag = Tag::from_bytes(b"rtla");
    pub const RIGHT_TO_LEFT_MIRRORED_FORMS: Tag = Tag::from_bytes(b"rtlm");
}

/// A feature tag with an accompanying range specifying on which subslice of
/// `shape`s input it should be applied.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Feature {
    /// The feature tag.
    pub tag: Tag,
    /// The feature value; 0 disables a boolean feature.
    pub value: u32,
    /// The first cluster the feature applies to.
    pub start: u32,
    /// One past the last cluster the feature applies to.
    pub end: u32,
}

impl Feature {
    /// Create a new `Feature` struct.
    pub fn new(tag: Tag, value: u32, range: impl RangeBounds<usize>) -> Feature {
        let start = match range.start_bound() {
            Bound::Included(&included) => included as u32,
            Bound::Excluded(&excluded) => excluded as u32 + 1,
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&included) => included as u32 + 1,
            Bound::Excluded(&excluded) => excluded as u32,
            Bound::Unbounded => u32::MAX,
        };

        Feature { tag, value, start, end }
    }

    /// Whether the feature covers the whole buffer.
    #[inline]
    pub fn is_global(&self) -> bool {
        self.start == 0 && self.end == u32::MAX
    }
}

impl FromStr for Feature {
    type Err = &'static str;

    /// Parses a `Feature` form a string.
    ///
    /// Possible values:
    ///
    /// - `kern` -> kern .. 1
    /// - `+kern` -> kern .. 1
    /// - `-kern` -> kern .. 0
    /// - `kern=0` -> kern .. 0
    /// - `kern=1` -> kern .. 1
    /// - `aalt=2` -> altr .. 2
    /// - `kern[]` -> kern .. 1
    /// - `kern[:]` -> kern .. 1
    /// - `kern[5:]` -> kern 5.. 1
    /// - `kern[:5]` -> kern ..=5 1
    /// - `kern[3:5]` -> kern 3..=5 1
    /// - `kern[3]` -> kern 3..=4 1
    /// - `aalt[3:5]=2` -> kern 3..=5 1
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ERR: &str = "invalid feature";

        let s = s.trim();
        let (mut value, s) = match s.as_bytes().first() {
            Some(b'-') => (0, &s[1..]),
            Some(b'+') => (1, &s[1..]),
            Some(_) => (1, s),
            None => return Err(ERR),
        };

        let tag_end = s.find(|c: char| c == '[' || c == '=').unwrap_or(s.len());
        let name = s[..tag_end].trim().trim_matches(|c: char| c == '"' || c == '\'');
        if name.is_empty() || name.len() > 4 || !name.is_ascii() {
            return Err(ERR);
        }
        let tag = Tag::from_bytes_lossy(name.as_bytes());

        let mut rest = &s[tag_end..];
        let mut start = 0u32;
        let mut end = u32::MAX;
        if let Some(range) = rest.strip_prefix('[') {
            let close = range.find(']').ok_or(ERR)?;
            let inner = range[..close].trim();
            rest = &range[close + 1..];

            match inner.split_once(':') {
                Some((a, b)) => {
                    let a = a.trim();
                    let b = b.trim();
                    if !a.is_empty() {
                        start = a.parse().map_err(|_| ERR)?;
                    }
                    if !b.is_empty() {
                        end = b.parse().map_err(|_| ERR)?;
                    }
                }
                None if !inner.is_empty() => {
                    start = inner.parse().map_err(|_| ERR)?;
                    end = start.checked_add(1).ok_or(ERR)?;
                }
                None => {}
            }
        }

        if let Some(v) = rest.strip_prefix('=') {
            value = match v.trim() {
                "on" | "true" => 1,
                "off" | "false" => 0,
                v => v.parse().map_err(|_| ERR)?,
            };
        } else if !rest.trim().is_empty() {
            return Err(ERR);
        }

        Ok(Feature { tag, value, start, end })
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.value == 0 && self.is_global() {
            f.write_str("-")?;
        }

        for c in self.tag.to_chars() {
            if c != ' ' {
                write!(f, "{}", c)?;
            }
        }

        if !self.is_global() {
            f.write_str("[")?;
            if self.start != 0 || self.end == 1 {
                write!(f, "{}", self.start)?;
            }
            if self.end != self.start.wrapping_add(1) {
                f.write_str(":")?;
                if self.end != u32::MAX {
                    write!(f, "{}", self.end)?;
                }
            }
            f.write_str("]")?;
        }

        if self.value > 1 || (self.value == 0 && !self.is_global()) {
            write!(f, "={}", self.value)?;
        }

        Ok(())
    }
}
