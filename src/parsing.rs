use once_cell::sync::Lazy;
use regex::Regex;

/// Nomenclatural code steering parser ambiguities. The hierarchy stage pins
/// [`NomCode::Botanical`] so a parenthesised word after a uninomial reads as
/// an author rather than a subgenus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NomCode {
    Zoological,
    Botanical,
    Bacterial,
    Virus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    /// The name without authorship, rank markers, or subgenus.
    pub canonical: String,
    pub authorship: Option<String>,
}

static UNINOMIAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][a-zë-]+$").expect("invalid uninomial pattern"));
static EPITHET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zë][a-zë-]+$").expect("invalid epithet pattern"));
static SUBGENUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\([A-Z][a-zë-]+\)$").expect("invalid subgenus pattern"));

/// Markers that join an infraspecific epithet to the name. They are dropped
/// from the canonical form.
const RANK_MARKERS: &[&str] = &["subsp.", "ssp.", "var.", "subvar.", "f.", "fo.", "forma", "sect.", "ser."];

/// Identification qualifiers. Everything after one of these is not part of
/// the name proper.
const QUALIFIERS: &[&str] = &["sp.", "spp.", "cf.", "aff.", "agg.", "s.l.", "s.s."];

/// Lowercase particles that begin an authorship rather than an epithet.
const AUTHOR_PARTICLES: &[&str] = &["de", "van", "von", "der", "den", "du", "la", "le", "ter", "ten"];

/// Parses a scientific name string into its canonical form and authorship.
///
/// This is intentionally a small parser: it covers uninomials, binomials,
/// infraspecific names with rank markers, subgenera, hybrid signs, and
/// trailing authorship with years. Names it cannot make sense of return
/// None and the caller records an empty canonical.
pub fn parse(name: &str, code: NomCode) -> Option<ParsedName> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut tokens = name.split_whitespace().peekable();
    let mut canonical: Vec<&str> = Vec::new();
    let mut authorship: Vec<&str> = Vec::new();

    let first = tokens.next()?;
    let first = first.strip_prefix('×').unwrap_or(first);
    if !UNINOMIAL.is_match(first) {
        return None;
    }
    canonical.push(first);

    // a parenthesised capitalised word right after the uninomial is a
    // subgenus under the zoological code and an author otherwise
    if let Some(token) = tokens.peek() {
        if SUBGENUS.is_match(token) {
            if code == NomCode::Zoological {
                tokens.next();
            }
        }
    }

    let mut in_authorship = false;
    for token in tokens {
        if in_authorship {
            authorship.push(token);
            continue;
        }

        if QUALIFIERS.contains(&token) {
            break;
        }
        if RANK_MARKERS.contains(&token) || token == "×" || token == "x" {
            continue;
        }
        if EPITHET.is_match(token) && !AUTHOR_PARTICLES.contains(&token) {
            canonical.push(token);
            continue;
        }

        in_authorship = true;
        authorship.push(token);
    }

    let authorship = if authorship.is_empty() {
        None
    }
    else {
        Some(authorship.join(" "))
    };

    Some(ParsedName {
        canonical: canonical.join(" "),
        authorship,
    })
}

/// The canonical form alone, or None for unparseable strings.
pub fn canonical(name: &str, code: NomCode) -> Option<String> {
    parse(name, code).map(|parsed| parsed.canonical)
}
