//! Naming conventions: pluralization, singularization and casing.
//!
//! Every function here is a pure function of its input and the static
//! inflection tables below. Results always start with an uppercase letter;
//! the rest of the word keeps its original casing so camel-cased table names
//! such as `OrderItems` survive (`OrderItem`).

/// Words that are the same in singular and plural form.
const UNCOUNTABLE: &[&str] = &[
    "data",
    "deer",
    "equipment",
    "fish",
    "information",
    "metadata",
    "money",
    "moose",
    "news",
    "rice",
    "series",
    "sheep",
    "species",
];

/// Irregular (singular, plural) pairs.
const IRREGULAR: &[(&str, &str)] = &[
    ("child", "children"),
    ("criterion", "criteria"),
    ("foot", "feet"),
    ("goose", "geese"),
    ("man", "men"),
    ("medium", "media"),
    ("mouse", "mice"),
    ("move", "moves"),
    ("ox", "oxen"),
    ("person", "people"),
    ("tooth", "teeth"),
    ("woman", "women"),
];

/// A suffix rewrite: when the lowercased word ends with `suffix`, the suffix
/// is replaced by `replacement`. `guard` optionally restricts the character
/// right before the suffix.
struct Rule {
    suffix: &'static str,
    replacement: &'static str,
    guard: Guard,
}

#[derive(Clone, Copy)]
enum Guard {
    Any,
    Consonant,
    OneOf(&'static str),
    NotOneOf(&'static str),
}

const fn rule(suffix: &'static str, replacement: &'static str) -> Rule {
    Rule {
        suffix,
        replacement,
        guard: Guard::Any,
    }
}

const fn guarded(suffix: &'static str, replacement: &'static str, guard: Guard) -> Rule {
    Rule {
        suffix,
        replacement,
        guard,
    }
}

// First match wins.
const PLURAL_RULES: &[Rule] = &[
    rule("quiz", "quizzes"),
    rule("matrix", "matrices"),
    rule("vertex", "vertices"),
    rule("index", "indices"),
    rule("alias", "aliases"),
    rule("status", "statuses"),
    rule("octopus", "octopi"),
    rule("virus", "viri"),
    rule("axis", "axes"),
    rule("testis", "testes"),
    rule("bus", "buses"),
    rule("buffalo", "buffaloes"),
    rule("tomato", "tomatoes"),
    rule("potato", "potatoes"),
    rule("hero", "heroes"),
    rule("sis", "ses"),
    rule("x", "xes"),
    rule("ch", "ches"),
    rule("sh", "shes"),
    rule("ss", "sses"),
    guarded("y", "ies", Guard::Consonant),
    guarded("fe", "ves", Guard::NotOneOf("f")),
    guarded("f", "ves", Guard::OneOf("lr")),
    rule("s", "s"),
    rule("", "s"),
];

const SINGULAR_RULES: &[Rule] = &[
    rule("quizzes", "quiz"),
    rule("matrices", "matrix"),
    rule("vertices", "vertex"),
    rule("indices", "index"),
    rule("aliases", "alias"),
    rule("statuses", "status"),
    rule("octopi", "octopus"),
    rule("viri", "virus"),
    rule("crises", "crisis"),
    rule("axes", "axis"),
    rule("testes", "testis"),
    rule("shoes", "shoe"),
    rule("buses", "bus"),
    rule("oes", "o"),
    rule("analyses", "analysis"),
    rule("diagnoses", "diagnosis"),
    rule("parentheses", "parenthesis"),
    rule("prognoses", "prognosis"),
    rule("synopses", "synopsis"),
    rule("theses", "thesis"),
    rule("xes", "x"),
    rule("ches", "ch"),
    rule("shes", "sh"),
    rule("sses", "ss"),
    rule("movies", "movie"),
    guarded("ies", "y", Guard::Consonant),
    guarded("ves", "f", Guard::OneOf("lr")),
    rule("hives", "hive"),
    guarded("ves", "fe", Guard::NotOneOf("f")),
    rule("ss", "ss"),
    rule("us", "us"),
    rule("is", "is"),
    rule("s", ""),
];

/// Plural form of `word` with a leading uppercase letter.
pub fn pluralize(word: &str) -> String {
    capitalize(&inflect(word, Number::Plural))
}

/// Singular form of `word` with a leading uppercase letter.
pub fn singularize(word: &str) -> String {
    capitalize(&inflect(word, Number::Singular))
}

/// Default foreign-key column name referencing `word`.
pub fn foreign_key(word: &str) -> String {
    format!("{}Id", singularize(word))
}

/// Uppercase the first character, keep the rest untouched.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Number {
    Singular,
    Plural,
}

fn inflect(word: &str, number: Number) -> String {
    let word = word.trim();
    if word.is_empty() {
        return String::new();
    }
    let lower = word.to_lowercase();
    // Byte offsets only line up when lowercasing kept the length.
    if lower.len() != word.len() {
        return word.to_string();
    }

    if UNCOUNTABLE.iter().any(|u| ends_with_word(word, &lower, u)) {
        return word.to_string();
    }

    for &(singular, plural) in IRREGULAR {
        let (from, to) = match number {
            Number::Plural => (singular, plural),
            Number::Singular => (plural, singular),
        };
        if ends_with_word(word, &lower, from) {
            return splice(word, from.len(), to);
        }
        // Already in the requested form.
        if ends_with_word(word, &lower, to) {
            return word.to_string();
        }
    }

    let rules = match number {
        Number::Plural => PLURAL_RULES,
        Number::Singular => SINGULAR_RULES,
    };
    for rule in rules {
        if !lower.ends_with(rule.suffix) {
            continue;
        }
        let before = lower[..lower.len() - rule.suffix.len()].chars().next_back();
        let allowed = match (rule.guard, before) {
            (Guard::Any, _) => true,
            (_, None) => false,
            (Guard::Consonant, Some(c)) => {
                !"aeiouy".contains(c) || lower.ends_with(&format!("qu{}", rule.suffix))
            }
            (Guard::OneOf(set), Some(c)) => set.contains(c),
            (Guard::NotOneOf(set), Some(c)) => !set.contains(c),
        };
        if allowed {
            return splice(word, rule.suffix.len(), rule.replacement);
        }
    }

    word.to_string()
}

/// `lower` ends with `suffix` either as the whole word or as the last
/// camel-case segment of `word`.
fn ends_with_word(word: &str, lower: &str, suffix: &str) -> bool {
    if !lower.ends_with(suffix) {
        return false;
    }
    let start = lower.len() - suffix.len();
    start == 0
        || word
            .get(start..)
            .is_some_and(|tail| tail.starts_with(|c: char| c.is_uppercase()))
}

/// Replace the last `cut` bytes of `word` with `replacement`, keeping the
/// case of the replaced segment's first letter.
fn splice(word: &str, cut: usize, replacement: &str) -> String {
    let start = word.len() - cut;
    let Some((head, tail)) = word.get(..start).zip(word.get(start..)) else {
        return word.to_string();
    };
    let upper = tail.starts_with(|c: char| c.is_uppercase());
    let mut out = String::with_capacity(start + replacement.len());
    out.push_str(head);
    if upper {
        out.push_str(&capitalize(replacement));
    } else {
        out.push_str(replacement);
    }
    out
}
