use crate::Path;
use crate::PathElem;

/// Depth of the `source[name=..]` element under
/// `datasource/config/sensor[id=..]`.
pub const SOURCE_OFFSET: usize = 3;

/// Depth of the first field element below the source element.
pub const FIELD_OFFSET: usize = SOURCE_OFFSET + 1;

/// Field of a [`super::DatasourceConfig`] addressed by a config path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigField {
    /// `source[name=..]` or its `name` leaf: the datasource exists
    Marker,
    Type,
    Enabled,
    Option(String),
    Credential(String),
    ForceUpdate,
    /// Applied without a redeploy
    LogLevel,
    /// Any leaf this sensor does not model
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPath {
    pub name: String,
    pub field: ConfigField,
}

/// Locates the datasource and field that a full config path addresses.
///
/// Returns `None` if the path does not reach a `source` element keyed by a
/// non-empty name.
pub fn decode_config_path(path: &Path) -> Option<DecodedPath> {
    let source = path.elem(SOURCE_OFFSET)?;
    if source.name != "source" {
        return None;
    }
    let name = source.key("name").filter(|n| !n.is_empty())?.to_string();

    let mut rest = path.elems.iter().skip(FIELD_OFFSET);
    let field = match rest.next() {
        None => ConfigField::Marker,
        Some(elem) => decode_field(elem, rest.next()),
    };
    Some(DecodedPath { name, field })
}

fn decode_field(
    elem: &PathElem,
    next: Option<&PathElem>,
) -> ConfigField {
    let value_follows = next.is_some_and(|e| e.name == "value");
    match elem.name.as_str() {
        "name" => ConfigField::Marker,
        "type" => ConfigField::Type,
        "enabled" => ConfigField::Enabled,
        "force-update" => ConfigField::ForceUpdate,
        "log-level" => ConfigField::LogLevel,
        "option" => match elem.key("key") {
            Some(k) if value_follows => ConfigField::Option(k.to_string()),
            _ => ConfigField::Ignored,
        },
        "credential" => match elem.key("key") {
            Some(k) if value_follows => ConfigField::Credential(k.to_string()),
            _ => ConfigField::Ignored,
        },
        _ => ConfigField::Ignored,
    }
}
