//! Turkish letters that reach us as their windows-1252 look-alikes.
//!
//! The six uppercase and lowercase letters İ Ğ Ş ı ğ ş share code points
//! with Ý Ð Þ ý ð þ across the 1252/1254 code pages, so text that took a
//! detour through the wrong one shows the Latin-1 glyph.

const GLYPHS: [(char, char); 6] = [
    ('Ý', 'İ'),
    ('Ð', 'Ğ'),
    ('Þ', 'Ş'),
    ('ý', 'ı'),
    ('ð', 'ğ'),
    ('þ', 'ş'),
];

fn remap_char(c: char) -> char {
    GLYPHS
        .iter()
        .find_map(|&(from, to)| (from == c).then_some(to))
        .unwrap_or(c)
}

/// Replace misdecoded glyphs with the Turkish letters they stand for.
pub fn remap_glyphs(text: &str) -> String {
    text.chars().map(remap_char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn mangle(text: &str) -> String {
        text.chars()
            .map(|c| {
                GLYPHS
                    .iter()
                    .find_map(|&(from, to)| (to == c).then_some(from))
                    .unwrap_or(c)
            })
            .collect()
    }

    #[test]
    fn test_known_words() {
        assert_eq!(remap_glyphs("Ýlksel"), "İlksel");
        assert_eq!(remap_glyphs("ÞÝLE-ÝSTANBUL"), "ŞİLE-İSTANBUL");
        assert_eq!(remap_glyphs("DAÐ"), "DAĞ");
        assert_eq!(remap_glyphs("GOKOVA KORFEZI (EGE DENIZI)"), "GOKOVA KORFEZI (EGE DENIZI)");
    }

    proptest! {
        #[test]
        fn prop_mangled_turkish_text_round_trips(text in "[a-zA-ZçÇöÖüÜıİğĞşŞ ()\\-]{0,40}") {
            prop_assert_eq!(remap_glyphs(&mangle(&text)), text.clone());
            prop_assert_eq!(remap_glyphs(&text), text);
        }
    }
}
