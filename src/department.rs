/// The ten collection-code department pairs used by `filter_records`'s
/// `depts` table and `Topicker.depts` (§6/Glossary). Two-letter codes are
/// accepted with or without a trailing `*` (the "contextually assigned,
/// not authoritative" marker used throughout the resolution engine).
pub const DEPARTMENTS: &[(&str, &str)] = &[
    ("an", "Anthropology"),
    ("bt", "Botany"),
    ("br", "Vertebrate Zoology: Birds"),
    ("en", "Entomology"),
    ("fs", "Vertebrate Zoology: Fishes"),
    ("hr", "Vertebrate Zoology: Herpetology"),
    ("iz", "Invertebrate Zoology"),
    ("mm", "Vertebrate Zoology: Mammals"),
    ("ms", "Mineral Sciences"),
    ("pl", "Paleobiology"),
];

pub const MINERAL_SCIENCES: &str = "Mineral Sciences";
pub const PALEOBIOLOGY: &str = "Paleobiology";

/// Resolves a short code (`"pl"`, `"pl*"`) or an already-full department
/// name to its canonical department name, preserving a trailing `*`.
pub fn resolve(dept: &str) -> Option<String> {
    let forced = !dept.ends_with('*');
    let bare = dept.trim_end_matches('*');
    let resolved = DEPARTMENTS
        .iter()
        .find(|(code, _)| *code == bare)
        .map(|(_, name)| name.to_string())
        .or_else(|| DEPARTMENTS.iter().find(|(_, name)| *name == bare).map(|(_, name)| name.to_string()))?;
    Some(if forced { resolved } else { format!("{resolved}*") })
}

/// Strips a trailing `*` marker, returning the bare department name.
pub fn bare(dept: &str) -> &str {
    dept.trim_end_matches('*')
}

/// True when `dept` carries the `*` suffix marking it as contextually
/// (not authoritatively) assigned.
pub fn is_contextual(dept: &str) -> bool {
    dept.ends_with('*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_code() {
        assert_eq!(resolve("pl").as_deref(), Some("Paleobiology"));
    }

    #[test]
    fn preserves_contextual_marker() {
        assert_eq!(resolve("pl*").as_deref(), Some("Paleobiology*"));
    }

    #[test]
    fn rejects_unknown_code() {
        assert_eq!(resolve("zz"), None);
    }

    #[test]
    fn is_contextual_detects_marker() {
        assert!(is_contextual("Paleobiology*"));
        assert!(!is_contextual("Paleobiology"));
    }
}
