//! Static symbol tables for text-mode LaTeX.

use phf::phf_map;

/// Greek letters by command name.
pub static GREEK_LETTERS: phf::Map<&'static str, &'static str> = phf_map! {
    "alpha" => "α", "beta" => "β", "gamma" => "γ", "delta" => "δ",
    "epsilon" => "ϵ", "varepsilon" => "ε", "zeta" => "ζ", "eta" => "η",
    "theta" => "θ", "vartheta" => "ϑ", "iota" => "ι", "kappa" => "κ",
    "lambda" => "λ", "mu" => "μ", "nu" => "ν", "xi" => "ξ",
    "pi" => "π", "varpi" => "ϖ", "rho" => "ρ", "varrho" => "ϱ",
    "sigma" => "σ", "varsigma" => "ς", "tau" => "τ", "upsilon" => "υ",
    "phi" => "ϕ", "varphi" => "φ", "chi" => "χ", "psi" => "ψ",
    "omega" => "ω",
    "Gamma" => "Γ", "Delta" => "Δ", "Theta" => "Θ", "Lambda" => "Λ",
    "Xi" => "Ξ", "Pi" => "Π", "Sigma" => "Σ", "Upsilon" => "Υ",
    "Phi" => "Φ", "Psi" => "Ψ", "Omega" => "Ω",
};

/// Set theory, logic, arrows and relations.
pub static OPERATORS: phf::Map<&'static str, &'static str> = phf_map! {
    // sets and logic
    "in" => "∈", "notin" => "∉", "ni" => "∋", "subset" => "⊂", "subseteq" => "⊆",
    "supset" => "⊃", "supseteq" => "⊇", "cup" => "∪", "cap" => "∩",
    "emptyset" => "∅", "varnothing" => "∅", "setminus" => "∖",
    "forall" => "∀", "exists" => "∃", "nexists" => "∄", "neg" => "¬", "lnot" => "¬",
    "land" => "∧", "lor" => "∨", "wedge" => "∧", "vee" => "∨",
    "top" => "⊤", "bot" => "⊥", "vdash" => "⊢", "models" => "⊨",
    // arrows
    "rightarrow" => "→", "to" => "→", "leftarrow" => "←", "gets" => "←",
    "leftrightarrow" => "↔", "Rightarrow" => "⇒", "Leftarrow" => "⇐",
    "Leftrightarrow" => "⇔", "iff" => "⟺", "implies" => "⟹", "impliedby" => "⟸",
    "mapsto" => "↦", "uparrow" => "↑", "downarrow" => "↓",
    "longrightarrow" => "⟶", "longleftarrow" => "⟵", "Longrightarrow" => "⟹",
    "hookrightarrow" => "↪", "rightsquigarrow" => "⇝",
    // relations and operators
    "leq" => "≤", "le" => "≤", "geq" => "≥", "ge" => "≥", "neq" => "≠", "ne" => "≠",
    "approx" => "≈", "equiv" => "≡", "sim" => "∼", "simeq" => "≃", "propto" => "∝",
    "times" => "×", "cdot" => "⋅", "div" => "÷", "pm" => "±", "mp" => "∓",
    "circ" => "∘", "oplus" => "⊕", "otimes" => "⊗", "star" => "⋆",
    "infty" => "∞", "partial" => "∂", "nabla" => "∇",
    "sum" => "∑", "prod" => "∏", "int" => "∫", "sqrt" => "√",
    "langle" => "⟨", "rangle" => "⟩",
};

/// Text symbols and special letters.
pub static TEXT_SYMBOLS: phf::Map<&'static str, &'static str> = phf_map! {
    "ldots" => "…", "dots" => "…", "cdots" => "⋯", "textellipsis" => "…",
    "textbullet" => "•", "dag" => "†", "ddag" => "‡", "S" => "§", "P" => "¶",
    "copyright" => "©", "textcopyright" => "©", "textregistered" => "®",
    "texttrademark" => "™", "textdegree" => "°", "euro" => "€", "pounds" => "£",
    "textendash" => "–", "textemdash" => "—",
    "textquoteleft" => "‘", "textquoteright" => "’",
    "textquotedblleft" => "“", "textquotedblright" => "”",
    "guillemotleft" => "«", "guillemotright" => "»",
    "ng" => "ŋ", "NG" => "Ŋ", "ss" => "ß", "aa" => "å", "AA" => "Å",
    "ae" => "æ", "AE" => "Æ", "oe" => "œ", "OE" => "Œ",
    "o" => "ø", "O" => "Ø", "l" => "ł", "L" => "Ł", "i" => "ı", "j" => "ȷ",
    "dh" => "ð", "DH" => "Ð", "th" => "þ", "TH" => "Þ",
    "LaTeX" => "LaTeX", "TeX" => "TeX", "BibTeX" => "BibTeX",
};

/// Precomposed letters keyed by accent command character followed by base letter.
pub static ACCENTS: phf::Map<&'static str, &'static str> = phf_map! {
    // acute
    "'a" => "á", "'e" => "é", "'i" => "í", "'o" => "ó", "'u" => "ú", "'y" => "ý",
    "'A" => "Á", "'E" => "É", "'I" => "Í", "'O" => "Ó", "'U" => "Ú", "'Y" => "Ý",
    "'c" => "ć", "'C" => "Ć", "'n" => "ń", "'N" => "Ń", "'s" => "ś", "'S" => "Ś",
    "'z" => "ź", "'Z" => "Ź", "'l" => "ĺ", "'L" => "Ĺ", "'r" => "ŕ", "'R" => "Ŕ",
    // grave
    "`a" => "à", "`e" => "è", "`i" => "ì", "`o" => "ò", "`u" => "ù",
    "`A" => "À", "`E" => "È", "`I" => "Ì", "`O" => "Ò", "`U" => "Ù",
    // umlaut
    "\"a" => "ä", "\"e" => "ë", "\"i" => "ï", "\"o" => "ö", "\"u" => "ü", "\"y" => "ÿ",
    "\"A" => "Ä", "\"E" => "Ë", "\"I" => "Ï", "\"O" => "Ö", "\"U" => "Ü", "\"Y" => "Ÿ",
    // circumflex
    "^a" => "â", "^e" => "ê", "^i" => "î", "^o" => "ô", "^u" => "û",
    "^A" => "Â", "^E" => "Ê", "^I" => "Î", "^O" => "Ô", "^U" => "Û",
    // tilde
    "~a" => "ã", "~o" => "õ", "~n" => "ñ", "~A" => "Ã", "~O" => "Õ", "~N" => "Ñ",
    // caron
    "vc" => "č", "vs" => "š", "vz" => "ž", "vr" => "ř", "ve" => "ě", "vn" => "ň",
    "vd" => "ď", "vt" => "ť", "vC" => "Č", "vS" => "Š", "vZ" => "Ž", "vR" => "Ř",
    "vE" => "Ě", "vN" => "Ň", "vD" => "Ď", "vT" => "Ť",
    // cedilla
    "cc" => "ç", "cs" => "ş", "ct" => "ţ", "cC" => "Ç", "cS" => "Ş", "cT" => "Ţ",
    // ring
    "ra" => "å", "ru" => "ů", "rA" => "Å", "rU" => "Ů",
    // macron
    "=a" => "ā", "=e" => "ē", "=i" => "ī", "=o" => "ō", "=u" => "ū",
    "=A" => "Ā", "=E" => "Ē", "=I" => "Ī", "=O" => "Ō", "=U" => "Ū",
    // dot above
    ".z" => "ż", ".Z" => "Ż", ".e" => "ė", ".E" => "Ė", ".I" => "İ",
    // breve
    "ua" => "ă", "ug" => "ğ", "uA" => "Ă", "uG" => "Ğ",
    // double acute
    "Ho" => "ő", "Hu" => "ű", "HO" => "Ő", "HU" => "Ű",
    // ogonek
    "ka" => "ą", "ke" => "ę", "kA" => "Ą", "kE" => "Ę",
};

/// Accent commands spelled with a symbol (`\'e`), which need no separator.
pub fn is_symbol_accent(ch: char) -> bool {
    matches!(ch, '\'' | '`' | '"' | '^' | '~' | '=' | '.')
}

/// Accent commands spelled with a letter (`\v{c}`, `\c c`).
pub fn is_letter_accent(ch: char) -> bool {
    matches!(ch, 'v' | 'c' | 'r' | 'u' | 'H' | 'k')
}

/// Look up a named text-mode symbol.
pub fn lookup_symbol(name: &str) -> Option<&'static str> {
    GREEK_LETTERS
        .get(name)
        .or_else(|| OPERATORS.get(name))
        .or_else(|| TEXT_SYMBOLS.get(name))
        .copied()
}

/// Look up a precomposed accented letter.
pub fn lookup_accent(accent: char, base: char) -> Option<&'static str> {
    let mut key = [0u8; 8];
    let mut len = accent.encode_utf8(&mut key).len();
    len += base.encode_utf8(&mut key[len..]).len();
    std::str::from_utf8(&key[..len])
        .ok()
        .and_then(|k| ACCENTS.get(k))
        .copied()
}

/// Replace text accents (`\"{o}`, `\'e`, `\v c`, `{\'\i}`) and named special
/// letters (`\ss`, `\ng`) by their Unicode characters. Anything else is kept.
pub fn decode_accents(text: &str) -> String {
    if !text.contains('\\') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut i = 0usize;
    while let Some(ch) = text[i..].chars().next() {
        if ch == '\\' {
            if let Some((rendered, len)) = accent_at(&text[i + 1..]) {
                out.push_str(rendered);
                i += 1 + len;
                continue;
            }
            // keep escaped pairs together so `\\"` is not read as an accent
            if let Some(next) = text[i + 1..].chars().next() {
                out.push('\\');
                out.push(next);
                i += 1 + next.len_utf8();
                continue;
            }
        }
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

/// Accent or special letter at the start of `after` (the text following a
/// backslash), with the number of bytes it spans.
fn accent_at(after: &str) -> Option<(&'static str, usize)> {
    let accent = after.chars().next()?;
    if is_symbol_accent(accent) || is_letter_accent(accent) {
        let rest = &after[accent.len_utf8()..];
        if let Some((base, used)) = accent_base(rest, is_letter_accent(accent)) {
            if let Some(rendered) = lookup_accent(accent, base) {
                return Some((rendered, accent.len_utf8() + used));
            }
        }
    }
    let name_len = after.bytes().take_while(|b| b.is_ascii_alphabetic()).count();
    if name_len == 0 {
        return None;
    }
    TEXT_SYMBOLS
        .get(&after[..name_len])
        .map(|rendered| (*rendered, name_len))
}

/// Base letter of an accent: `{o}`, `{\i}`, a bare letter after a symbol
/// accent, or a letter after a space for letter accents.
fn accent_base(rest: &str, letter_accent: bool) -> Option<(char, usize)> {
    if let Some(group) = rest.strip_prefix('{') {
        let close = group.find('}')?;
        let inner = group[..close].trim();
        let base = match inner {
            "\\i" => 'i',
            "\\j" => 'j',
            _ => {
                let mut chars = inner.chars();
                let base = chars.next()?;
                if chars.next().is_some() {
                    return None;
                }
                base
            }
        };
        return Some((base, close + 2));
    }
    let trimmed = rest.trim_start_matches(' ');
    let skipped = rest.len() - trimmed.len();
    if letter_accent && skipped == 0 {
        return None;
    }
    let base = trimmed.chars().next().filter(|c| c.is_ascii_alphabetic())?;
    if !letter_accent && skipped > 0 {
        return None;
    }
    Some((base, skipped + base.len_utf8()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_resolve_from_every_table() {
        assert_eq!(lookup_symbol("alpha"), Some("α"));
        assert_eq!(lookup_symbol("cup"), Some("∪"));
        assert_eq!(lookup_symbol("rightarrow"), Some("→"));
        assert_eq!(lookup_symbol("ng"), Some("ŋ"));
        assert_eq!(lookup_symbol("item"), None);
    }

    #[test]
    fn accents_compose() {
        assert_eq!(lookup_accent('"', 'o'), Some("ö"));
        assert_eq!(lookup_accent('v', 'c'), Some("č"));
        assert_eq!(lookup_accent('c', 'c'), Some("ç"));
        assert_eq!(lookup_accent('~', 'n'), Some("ñ"));
        assert_eq!(lookup_accent('v', 'q'), None);
    }

    #[test]
    fn decode_accents_in_text() {
        assert_eq!(decode_accents("M\\\"{o}bius"), "Möbius");
        assert_eq!(decode_accents("Ho\\v{c}evar and \\v c"), "Hočevar and č");
        assert_eq!(decode_accents("G\\'{\\i}a \\'el\\`eve"), "Gía élève");
        assert_eq!(decode_accents("Stra\\ss e \\ng"), "Straß e ŋ");
        assert_eq!(decode_accents("\\cite{x} \\vspace"), "\\cite{x} \\vspace");
    }
}
