use phf::{Set, phf_set};

/// Two-letter element symbols recognized when an element has to be guessed from an
/// atom name. Calcium is left out on purpose: `CA` is far more often an alpha carbon.
static TWO_LETTER_ELEMENTS: Set<&'static str> = phf_set! {
    "CL", "BR", "NA", "LI", "MG", "ZN", "FE", "SI", "AL", "AR", "NE", "HE", "KR", "XE",
};

const RESIDUE_LABEL_WIDTH: usize = 3;
const BASE32_DIGITS: &[u8; 32] = b"0123456789ABCDEFGHIJKLMNOPQRSTUV";

/// Returns `true` if the atom name denotes a hydrogen (first character `H` or `h`).
///
/// Unlike heavy-atom checks elsewhere, a leading `D` is *not* treated as deuterium:
/// Drude shadow particles are named with that prefix.
pub fn is_hydrogen_name(atom_name: &str) -> bool {
    atom_name
        .trim()
        .chars()
        .next()
        .is_some_and(|c| c.eq_ignore_ascii_case(&'H'))
}

/// Maps a force-field residue template name onto the label used in PDB records.
///
/// Trailing charge signs are stripped and the result is truncated to three characters,
/// e.g. `c4mim+` becomes `c4m` and `BF4-` becomes `BF4`.
pub fn residue_label(template_name: &str) -> String {
    template_name
        .trim()
        .trim_end_matches(['+', '-'])
        .chars()
        .take(RESIDUE_LABEL_WIDTH)
        .collect()
}

/// Encodes a counter in base 32 using the digits `0-9A-V`.
pub fn base32_token(mut value: usize) -> String {
    let mut digits = Vec::new();
    loop {
        digits.push(BASE32_DIGITS[value % 32]);
        value /= 32;
        if value == 0 {
            break;
        }
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// Guesses an element symbol from an atom name when the record carries none.
pub fn element_from_name(atom_name: &str) -> String {
    let letters: String = atom_name
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    let upper = letters.to_ascii_uppercase();
    if upper.len() >= 2 && TWO_LETTER_ELEMENTS.contains(&upper[..2]) {
        let mut symbol = upper[..1].to_string();
        symbol.push_str(&upper[1..2].to_ascii_lowercase());
        return symbol;
    }
    upper.chars().next().map(String::from).unwrap_or_default()
}
