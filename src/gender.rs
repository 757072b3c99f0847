//! Name gender heuristic, optimized for portuguese given names.
//!
//! Classification keys on the last letter of the first name, with suffix
//! patterns overriding the default for each letter.

use std::sync::LazyLock;

use regex::Regex;

use crate::text::remove_latin_accents;

/// Inferred gender of a given name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
        }
    }
}

// Feminine-by-default last letters are 'a' and 'e'; everything else
// defaults to masculine. The patterns below list the exceptions.
static MALE_A: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        "rba$|vica$|meida$|randa$|uda$|afa$|cha$|natha$|aka$|tila$|vila$|cola$|orla$|\
         yama$|nma$|zuma$|gna$|moa$|jara$|guara$|beira$|veira$|ira$|jura$|mura$|tura$|\
         assa$|onata$|jota$|ista$|qua$|ava$|silva$|ova$|rva$|wa$|ouza$",
    )
    .expect("male a-suffix pattern")
});
static MALE_E: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        "ube$|nce$|dade$|alde$|nde$|ode$|rge$|uge$|ike$|uke$|vale$|cle$|ole$|yle$|\
         ame$|ime$|lme$|rme$|ume$|phane$|ivane$|ovane$|cone$|done$|eone$|rone$|tone$|\
         rne$|une$|ipe$|ope$|ppe$|bre$|dre$|aire$|ore$|rre$|tre$|jose$|rse$|use$|\
         ante$|ente$|arte$|laerte$|reste$|gue$|aque$|rique$|oque$|rque$|osue$|tave$|\
         ive$|ove$|we$|ye$|aze$|uze$",
    )
    .expect("male e-suffix pattern")
});
static FEMALE_B: LazyLock<Regex> = LazyLock::new(|| Regex::new("inadab$").expect("b pattern"));
static FEMALE_C: LazyLock<Regex> = LazyLock::new(|| Regex::new("lic$|tic$").expect("c pattern"));
static FEMALE_D: LazyLock<Regex> = LazyLock::new(|| Regex::new("edad$|rid$").expect("d pattern"));
static FEMALE_H: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("kah$|nah$|rah$|sh$|beth$|reth$|seth$|edith$|udith$|ruth$").expect("h pattern")
});
static FEMALE_I: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        "abi$|glaci$|neci$|nci$|oci$|uci$|leidi$|hirlei$|sirlei$|mei$|keli$|leli$|neli$|\
         seli$|ueli$|veli$|zeli$|ili$|helli$|kelli$|arli$|oemi$|romi$|yumi$|zumi$|iani$|\
         irani$|vani$|eni$|leni$|zeni$|lini$|moni$|uni$|mari$|veri$|ayuri$|gessi$|zazi$|suzi$",
    )
    .expect("i pattern")
});
static FEMALE_L: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("bel$|mabel$|rabel$|sabel$|zabel$|achel$|aquel$|riel$").expect("l pattern")
});
static FEMALE_M: LazyLock<Regex> = LazyLock::new(|| Regex::new("iam$|riam$|liom$").expect("m pattern"));
static FEMALE_N: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("lilian$|lillian$|marian$|irian$|yrian$|ivian$|elen$|ellen$|arin$|carin$|\
                karin$|erin$|aryn$|evelyn$|arolyn$|arilyn$|haron$|sharon$")
        .expect("n pattern")
});
static FEMALE_R: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("eather$|esther$|ester$|flor$|eonor$|izabeth$").expect("r pattern")
});
static FEMALE_S: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("ares$|ines$|aines$|oines$|is$|lis$|ris$|ys$").expect("s pattern")
});
static FEMALE_Y: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("may$|ney$|ally$|elly$|emily$|mary$|ary$|ndy$|peggy$|iggy$|inny$|anny$|\
                enny$|ionny$|cy$|dy$|lly$|my$|ny$|ry$|sy$|ty$")
        .expect("y pattern")
});
static FEMALE_Z: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("riz$|eatriz$|uz$|liz$|iz$").expect("z pattern")
});

/// Identify the likely gender of a given name. Only the first token is
/// considered; accents are folded before matching.
pub fn identify(name: &str) -> Gender {
    let first = name.split_whitespace().next().unwrap_or("");
    let first = remove_latin_accents(&first.to_lowercase());
    let last = match first.chars().last() {
        Some(c) => c,
        None => return Gender::Female,
    };
    match last {
        'a' => {
            if MALE_A.is_match(&first) {
                Gender::Male
            } else {
                Gender::Female
            }
        }
        'e' => {
            if MALE_E.is_match(&first) {
                Gender::Male
            } else {
                Gender::Female
            }
        }
        'b' => flip(FEMALE_B.is_match(&first)),
        'c' => flip(FEMALE_C.is_match(&first)),
        'd' => flip(FEMALE_D.is_match(&first)),
        'h' => flip(FEMALE_H.is_match(&first)),
        'i' => flip(FEMALE_I.is_match(&first)),
        'l' => flip(FEMALE_L.is_match(&first)),
        'm' => flip(FEMALE_M.is_match(&first)),
        'n' => flip(FEMALE_N.is_match(&first)),
        'r' => flip(FEMALE_R.is_match(&first)),
        's' => flip(FEMALE_S.is_match(&first)),
        'y' => flip(FEMALE_Y.is_match(&first)),
        'z' => flip(FEMALE_Z.is_match(&first)),
        _ => Gender::Male,
    }
}

fn flip(female: bool) -> Gender {
    if female { Gender::Female } else { Gender::Male }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_names() {
        assert_eq!(identify("Maria"), Gender::Female);
        assert_eq!(identify("João"), Gender::Male);
        assert_eq!(identify("Pedro"), Gender::Male);
        assert_eq!(identify("Ana Clara"), Gender::Female);
        assert_eq!(identify("Sarah"), Gender::Female);
        assert_eq!(identify("David"), Gender::Male);
        assert_eq!(identify("Beatriz"), Gender::Female);
    }

    #[test]
    fn a_final_exceptions_are_male() {
        assert_eq!(identify("Silva"), Gender::Male);
        assert_eq!(identify("Jota"), Gender::Male);
    }

    #[test]
    fn empty_name_does_not_panic() {
        assert_eq!(identify(""), Gender::Female);
    }
}
