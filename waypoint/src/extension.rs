//! Extensions de waypoint
//!
//! Les extensions sont un ensemble fermé de variantes (`Extension`). La table
//! `EXTENSION_KINDS` associe un nom de tag aux constructeurs pour chacun des
//! deux formats d'entrée (élément XML, valeur YAML). Tout tag absent de la
//! table est ignoré.

use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::types::Address;
use crate::yaml::yaml_scalar;

/// Namespace Garmin `WaypointExtension/v1`, doublon de `gpxx` qu'on ignore
pub const WPTX1_NAMESPACE: &str = "http://www.garmin.com/xmlschemas/WaypointExtension/v1";

/// Préfixe usuel associé à `WPTX1_NAMESPACE`
pub const WPTX1_PREFIX: &str = "wptx1";

/// Namespace Garmin `GpxExtensions/v3` utilisé en écriture
pub const GPXX_NAMESPACE: &str = "http://www.garmin.com/xmlschemas/GpxExtensions/v3";

/// Préfixe associé à `GPXX_NAMESPACE`
pub const GPXX_PREFIX: &str = "gpxx";

/// Retire le namespace d'un tag: `{uri}Tag`, `prefix:Tag` → `Tag`
pub fn local_name(tag: &str) -> &str {
    let tag = tag.rsplit('}').next().unwrap_or(tag);
    tag.rsplit(':').next().unwrap_or(tag)
}

/// Préfixe d'un tag qualifié (`gpxx:Address` → `gpxx`)
fn prefix(tag: &str) -> Option<&str> {
    tag.split_once(':').map(|(p, _)| p)
}

/// Élément XML minimal (sous-arbre `<extensions>`)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    /// Nom qualifié tel qu'écrit dans le document (`gpxx:Address`)
    pub name: String,

    /// URI du namespace résolu, si lié
    pub namespace: Option<String>,

    /// Texte de l'élément (trimé)
    pub text: Option<String>,

    /// Éléments enfants
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Élément feuille portant un texte
    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }
}

/// Extension `WaypointExtension` (Garmin), ne porte que l'adresse
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaypointExtension {
    pub address: Option<Address>,
}

impl WaypointExtension {
    pub const TAG: &'static str = "WaypointExtension";

    pub fn with_address(address: Address) -> Self {
        Self {
            address: Some(address),
        }
    }

    /// Construit depuis `<gpxx:WaypointExtension>`
    pub fn from_element(element: &Element) -> Self {
        let address = element
            .children
            .iter()
            .find(|child| Address::matches_tag(&child.name))
            .map(address_from_element);

        Self { address }
    }

    /// Construit depuis `{Address: {...}}`
    pub fn from_yaml(value: &Value) -> Self {
        let address = value.as_mapping().and_then(|map| {
            map.iter().find_map(|(key, value)| {
                let key = key.as_str()?;
                Address::matches_tag(key).then(|| address_from_yaml(value))
            })
        });

        Self { address }
    }

    pub fn to_element(&self) -> Element {
        let mut element = Element::new(format!("{}:{}", GPXX_PREFIX, Self::TAG));
        if let Some(address) = &self.address {
            element.push(address_to_element(address));
        }
        element
    }

    pub fn to_yaml(&self) -> Value {
        let mut map = Mapping::new();
        if let Some(address) = &self.address {
            map.insert(Value::from(Address::TAG), address_to_yaml(address));
        }
        Value::Mapping(map)
    }
}

fn address_from_element(element: &Element) -> Address {
    let mut address = Address::default();
    for child in &element.children {
        if let Some(text) = child.text.as_deref() {
            if !address.set(&child.name, text) {
                debug!(tag = child.name.as_str(), "Ignoring unknown address field");
            }
        }
    }
    address
}

fn address_from_yaml(value: &Value) -> Address {
    let mut address = Address::default();
    if let Some(map) = value.as_mapping() {
        for (key, value) in map {
            let (Some(key), Some(value)) = (key.as_str(), yaml_scalar(value)) else {
                continue;
            };
            if !address.set(key, &value) {
                debug!(tag = key, "Ignoring unknown address field");
            }
        }
    }
    address
}

fn address_to_element(address: &Address) -> Element {
    let mut element = Element::new(format!("{}:{}", GPXX_PREFIX, Address::TAG));
    for (tag, value) in address.fields() {
        element.push(Element::with_text(format!("{}:{}", GPXX_PREFIX, tag), value));
    }
    element
}

fn address_to_yaml(address: &Address) -> Value {
    let map: Mapping = address
        .fields()
        .map(|(tag, value)| (Value::from(tag), Value::from(value)))
        .collect();
    Value::Mapping(map)
}

/// Extension reconnue, attachée à un waypoint
#[derive(Debug, Clone, PartialEq)]
pub enum Extension {
    Waypoint(WaypointExtension),
}

impl Extension {
    /// Nom de tag (sans namespace)
    pub fn tag(&self) -> &'static str {
        match self {
            Extension::Waypoint(_) => WaypointExtension::TAG,
        }
    }

    pub fn to_element(&self) -> Element {
        match self {
            Extension::Waypoint(ext) => ext.to_element(),
        }
    }

    pub fn to_yaml(&self) -> Value {
        match self {
            Extension::Waypoint(ext) => ext.to_yaml(),
        }
    }
}

/// Entrée de la table d'enregistrement: tag → constructeurs
pub struct ExtensionKind {
    pub tag: &'static str,
    pub from_element: fn(&Element) -> Extension,
    pub from_yaml: fn(&Value) -> Extension,
}

/// Extensions supportées
pub static EXTENSION_KINDS: &[ExtensionKind] = &[ExtensionKind {
    tag: WaypointExtension::TAG,
    from_element: |element| Extension::Waypoint(WaypointExtension::from_element(element)),
    from_yaml: |value| Extension::Waypoint(WaypointExtension::from_yaml(value)),
}];

/// Cherche le type d'extension correspondant à un tag.
///
/// Les tags du namespace `wptx1` sont ignorés (doublon de `gpxx`).
pub fn lookup_kind(tag: &str, namespace: Option<&str>) -> Option<&'static ExtensionKind> {
    if namespace == Some(WPTX1_NAMESPACE) || prefix(tag) == Some(WPTX1_PREFIX) {
        return None;
    }
    let name = local_name(tag);
    EXTENSION_KINDS.iter().find(|kind| kind.tag == name)
}

/// Filtre les enfants de `<extensions>` vers les extensions reconnues
pub fn read_extensions_from_elements(elements: &[Element]) -> Option<Vec<Extension>> {
    let extensions: Vec<Extension> = elements
        .iter()
        .filter_map(|element| {
            let kind = lookup_kind(&element.name, element.namespace.as_deref());
            if kind.is_none() {
                debug!(tag = element.name.as_str(), "Dropping unsupported extension");
            }
            kind.map(|kind| (kind.from_element)(element))
        })
        .collect();

    (!extensions.is_empty()).then_some(extensions)
}

/// Filtre la liste YAML `extensions: [{Tag: {...}}, ...]`
pub fn read_extensions_from_yaml(value: Option<&Value>) -> Option<Vec<Extension>> {
    let entries = value?.as_sequence()?;

    let mut extensions = Vec::new();
    for entry in entries {
        let Some(map) = entry.as_mapping() else {
            continue;
        };
        for (key, value) in map {
            let Some(tag) = key.as_str() else {
                continue;
            };
            match lookup_kind(tag, None) {
                Some(kind) => extensions.push((kind.from_yaml)(value)),
                None => debug!(tag, "Dropping unsupported extension"),
            }
        }
    }

    (!extensions.is_empty()).then_some(extensions)
}

/// Liste YAML des extensions (`None` si aucune)
pub fn extensions_to_yaml(extensions: Option<&[Extension]>) -> Option<Value> {
    let extensions = extensions.filter(|e| !e.is_empty())?;
    let items = extensions
        .iter()
        .map(|ext| {
            let mut map = Mapping::new();
            map.insert(Value::from(ext.tag()), ext.to_yaml());
            Value::Mapping(map)
        })
        .collect();
    Some(Value::Sequence(items))
}
