/// Handles under which the YAML core tags may be spelled.
const CORE_PREFIXES: &[&str] = &["tag:yaml.org,2002:!", "tag:yaml.org,2002:", "!!", "!"];

/// Prefix of tags that name a registered type directly (`!type:Point`).
pub const TYPE_NAME_TAG_PREFIX: &str = "!type:";

pub(crate) const TAG_BINARY: &str = "tag:yaml.org,2002:binary";
pub(crate) const TAG_STR: &str = "tag:yaml.org,2002:str";

/// Tags of the YAML core/1.1 type repository that affect construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoreTag {
    Null,
    Bool,
    Int,
    Float,
    Str,
    Binary,
    Seq,
    Map,
    Set,
    Timestamp,
}

impl CoreTag {
    /// Canonical long form, as emitted by the representer.
    pub fn canonical(self) -> &'static str {
        match self {
            CoreTag::Null => "tag:yaml.org,2002:null",
            CoreTag::Bool => "tag:yaml.org,2002:bool",
            CoreTag::Int => "tag:yaml.org,2002:int",
            CoreTag::Float => "tag:yaml.org,2002:float",
            CoreTag::Str => TAG_STR,
            CoreTag::Binary => TAG_BINARY,
            CoreTag::Seq => "tag:yaml.org,2002:seq",
            CoreTag::Map => "tag:yaml.org,2002:map",
            CoreTag::Set => "tag:yaml.org,2002:set",
            CoreTag::Timestamp => "tag:yaml.org,2002:timestamp",
        }
    }
}

/// Recognize `!!int`, `!int`, `tag:yaml.org,2002:int` and `tag:yaml.org,2002:!int`
/// (and the same for the other core tags).
pub fn core_tag(tag: &str) -> Option<CoreTag> {
    let suffix = CORE_PREFIXES
        .iter()
        .find_map(|prefix| tag.strip_prefix(prefix))?;
    Some(match suffix {
        "null" => CoreTag::Null,
        "bool" => CoreTag::Bool,
        "int" => CoreTag::Int,
        "float" => CoreTag::Float,
        "str" => CoreTag::Str,
        "binary" => CoreTag::Binary,
        "seq" => CoreTag::Seq,
        "map" => CoreTag::Map,
        "set" => CoreTag::Set,
        "timestamp" => CoreTag::Timestamp,
        _ => return None,
    })
}

/// True if a scalar with this tag may be taken as a string as is.
pub(crate) fn can_parse_into_string(tag: Option<&str>) -> bool {
    match tag.and_then(core_tag) {
        None | Some(CoreTag::Str) | Some(CoreTag::Timestamp) => true,
        Some(_) => false,
    }
}

pub(crate) fn is_null_tag(tag: Option<&str>) -> bool {
    tag.and_then(core_tag) == Some(CoreTag::Null)
}

/// Type name embedded in a `!type:` tag.
pub(crate) fn embedded_type_name(tag: &str) -> Option<&str> {
    tag.strip_prefix(TYPE_NAME_TAG_PREFIX).filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_all_spellings() {
        for t in ["!!int", "!int", "tag:yaml.org,2002:int", "tag:yaml.org,2002:!int"] {
            assert_eq!(core_tag(t), Some(CoreTag::Int), "{t}");
        }
        assert_eq!(core_tag("!Point"), None);
        assert_eq!(core_tag("int"), None);
    }

    #[test]
    fn string_compatibility() {
        assert!(can_parse_into_string(None));
        assert!(can_parse_into_string(Some("!!str")));
        assert!(can_parse_into_string(Some("!custom")));
        assert!(!can_parse_into_string(Some("!!float")));
        assert!(is_null_tag(Some("tag:yaml.org,2002:null")));
    }

    #[test]
    fn embedded_names() {
        assert_eq!(embedded_type_name("!type:Point"), Some("Point"));
        assert_eq!(embedded_type_name("!type:"), None);
        assert_eq!(embedded_type_name("!Point"), None);
    }
}
