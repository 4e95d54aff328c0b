//! Lecture/écriture GPX 1.1
//!
//! Seuls les `<wpt>` sont lus: traces et routes sont ignorées. Le sous-arbre
//! `<extensions>` est chargé dans un petit arbre d'[`Element`] avec namespaces
//! résolus, puis filtré par la table des extensions.

use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::ResolveResult;
use quick_xml::{NsReader, Writer};
use tracing::trace;

use crate::extension::{read_extensions_from_elements, Element, GPXX_NAMESPACE, GPXX_PREFIX};
use crate::timefix::{format_timestamp, parse_timestamp};
use crate::types::Waypoint;
use crate::WaypointError;

/// Namespace GPX 1.1
pub const GPX_NAMESPACE: &str = "http://www.topografix.com/GPX/1/1";

/// Valeur de l'attribut `creator` en écriture
pub const CREATOR: &str = "gpxutil";

type XmlReader<'i> = NsReader<&'i [u8]>;

fn next_event<'i>(reader: &mut XmlReader<'i>) -> Result<(Option<String>, Event<'i>), WaypointError> {
    let (ns, event) = reader.read_resolved_event()?;
    let ns = match ns {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        _ => None,
    };
    Ok((ns, event))
}

fn unexpected_eof(context: &str) -> WaypointError {
    WaypointError::parse_error("GPX", format!("unexpected end of document inside <{}>", context))
}

fn parse_number(field: &str, value: &str) -> Result<f64, WaypointError> {
    fast_float::parse::<f64, _>(value.trim()).map_err(|_| WaypointError::invalid_number(field, value))
}

/// Lit un document GPX complet.
///
/// Un document sans élément racine `<gpx>` (texte libre, CSV, fichier vide) est une erreur.
pub fn read_gpx(text: &str) -> Result<Vec<Waypoint>, WaypointError> {
    let mut reader = NsReader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut waypoints = Vec::new();
    let mut seen_root = false;

    loop {
        let (_, event) = next_event(&mut reader)?;
        match event {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"gpx" => {
                seen_root = true;
            }
            Event::Start(e) if e.local_name().as_ref() == b"wpt" => {
                let mut wpt = waypoint_from_attributes(waypoints.len(), &e)?;
                read_waypoint_body(&mut reader, &mut wpt)?;
                waypoints.push(wpt);
            }
            Event::Empty(e) if e.local_name().as_ref() == b"wpt" => {
                waypoints.push(waypoint_from_attributes(waypoints.len(), &e)?);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(WaypointError::parse_error("GPX", "missing <gpx> root element"));
    }

    trace!(count = waypoints.len(), "GPX document read");
    Ok(waypoints)
}

fn waypoint_from_attributes(index: usize, start: &BytesStart) -> Result<Waypoint, WaypointError> {
    let mut latitude = None;
    let mut longitude = None;

    for attr in start.attributes() {
        let attr = attr?;
        let value = attr.unescape_value()?;
        match attr.key.local_name().as_ref() {
            b"lat" => latitude = Some(parse_number("lat", &value)?),
            b"lon" => longitude = Some(parse_number("lon", &value)?),
            _ => {}
        }
    }

    let latitude = latitude.ok_or(WaypointError::MissingCoordinate {
        index,
        field: "latitude",
    })?;
    let longitude = longitude.ok_or(WaypointError::MissingCoordinate {
        index,
        field: "longitude",
    })?;

    Ok(Waypoint::new(latitude, longitude))
}

fn read_waypoint_body(reader: &mut XmlReader<'_>, wpt: &mut Waypoint) -> Result<(), WaypointError> {
    loop {
        let (_, event) = next_event(reader)?;
        match event {
            Event::Start(e) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"extensions" => {
                        let children = read_children(reader, "extensions")?;
                        wpt.extensions = read_extensions_from_elements(&children);
                    }
                    b"ele" => {
                        wpt.elevation = read_text(reader, "ele")?
                            .map(|v| parse_number("ele", &v))
                            .transpose()?;
                    }
                    b"time" => {
                        wpt.time = read_text(reader, "time")?
                            .map(|v| parse_timestamp(&v))
                            .transpose()?;
                    }
                    b"name" => wpt.name = read_text(reader, "name")?,
                    b"cmt" => wpt.comment = read_text(reader, "cmt")?,
                    b"desc" => wpt.description = read_text(reader, "desc")?,
                    b"src" => wpt.source = read_text(reader, "src")?,
                    b"sym" => wpt.symbol = read_text(reader, "sym")?,
                    b"type" => wpt.kind = read_text(reader, "type")?,
                    _ => skip_element(reader, "wpt")?,
                }
            }
            Event::End(_) => return Ok(()),
            Event::Eof => return Err(unexpected_eof("wpt")),
            _ => {}
        }
    }
}

/// Texte d'un élément simple, jusqu'à sa balise fermante
fn read_text(reader: &mut XmlReader<'_>, context: &str) -> Result<Option<String>, WaypointError> {
    let mut text = String::new();
    let mut depth = 0usize;

    loop {
        let (_, event) = next_event(reader)?;
        match event {
            Event::Text(e) if depth == 0 => text.push_str(&e.unescape()?),
            Event::CData(e) if depth == 0 => text.push_str(&String::from_utf8_lossy(&e)),
            Event::Start(_) => depth += 1,
            Event::End(_) if depth == 0 => break,
            Event::End(_) => depth -= 1,
            Event::Eof => return Err(unexpected_eof(context)),
            _ => {}
        }
    }

    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}

fn skip_element(reader: &mut XmlReader<'_>, context: &str) -> Result<(), WaypointError> {
    let mut depth = 0usize;
    loop {
        let (_, event) = next_event(reader)?;
        match event {
            Event::Start(_) => depth += 1,
            Event::End(_) if depth == 0 => return Ok(()),
            Event::End(_) => depth -= 1,
            Event::Eof => return Err(unexpected_eof(context)),
            _ => {}
        }
    }
}

/// Enfants d'un élément ouvert, chargés récursivement
fn read_children(reader: &mut XmlReader<'_>, context: &str) -> Result<Vec<Element>, WaypointError> {
    let mut children = Vec::new();
    loop {
        let (ns, event) = next_event(reader)?;
        match event {
            Event::Start(e) => {
                let mut element = Element::new(String::from_utf8_lossy(e.name().as_ref()));
                element.namespace = ns;
                read_element_content(reader, &mut element)?;
                children.push(element);
            }
            Event::Empty(e) => {
                let mut element = Element::new(String::from_utf8_lossy(e.name().as_ref()));
                element.namespace = ns;
                children.push(element);
            }
            Event::End(_) => return Ok(children),
            Event::Eof => return Err(unexpected_eof(context)),
            _ => {}
        }
    }
}

fn read_element_content(reader: &mut XmlReader<'_>, element: &mut Element) -> Result<(), WaypointError> {
    let mut text = String::new();
    loop {
        let (ns, event) = next_event(reader)?;
        match event {
            Event::Start(e) => {
                let mut child = Element::new(String::from_utf8_lossy(e.name().as_ref()));
                child.namespace = ns;
                read_element_content(reader, &mut child)?;
                element.push(child);
            }
            Event::Empty(e) => {
                let mut child = Element::new(String::from_utf8_lossy(e.name().as_ref()));
                child.namespace = ns;
                element.push(child);
            }
            Event::Text(e) => text.push_str(&e.unescape()?),
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e)),
            Event::End(_) => break,
            Event::Eof => return Err(unexpected_eof(&element.name)),
            _ => {}
        }
    }

    let text = text.trim();
    if !text.is_empty() {
        element.text = Some(text.to_string());
    }
    Ok(())
}

/// Écrit un document GPX 1.1 (namespace `gpxx` déclaré pour les adresses)
pub fn write_gpx<W: Write>(waypoints: &[Waypoint], writer: W) -> Result<(), WaypointError> {
    let mut xml = Writer::new_with_indent(writer, b' ', 2);

    xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let xmlns_gpxx = format!("xmlns:{}", GPXX_PREFIX);
    let mut root = BytesStart::new("gpx");
    root.push_attribute(("version", "1.1"));
    root.push_attribute(("creator", CREATOR));
    root.push_attribute(("xmlns", GPX_NAMESPACE));
    root.push_attribute((xmlns_gpxx.as_str(), GPXX_NAMESPACE));
    xml.write_event(Event::Start(root))?;

    for wpt in waypoints {
        write_waypoint(&mut xml, wpt)?;
    }

    xml.write_event(Event::End(BytesEnd::new("gpx")))?;
    xml.get_mut().write_all(b"\n")?;
    xml.get_mut().flush()?;

    Ok(())
}

fn write_waypoint<W: Write>(xml: &mut Writer<W>, wpt: &Waypoint) -> Result<(), WaypointError> {
    let lat = wpt.latitude.to_string();
    let lon = wpt.longitude.to_string();
    let mut start = BytesStart::new("wpt");
    start.push_attribute(("lat", lat.as_str()));
    start.push_attribute(("lon", lon.as_str()));
    xml.write_event(Event::Start(start))?;

    // Ordre imposé par le schéma GPX 1.1
    if let Some(ele) = wpt.elevation {
        write_text_element(xml, "ele", &ele.to_string())?;
    }
    if let Some(time) = &wpt.time {
        write_text_element(xml, "time", &format_timestamp(time))?;
    }
    let texts = [
        ("name", &wpt.name),
        ("cmt", &wpt.comment),
        ("desc", &wpt.description),
        ("src", &wpt.source),
        ("sym", &wpt.symbol),
        ("type", &wpt.kind),
    ];
    for (tag, value) in texts {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            write_text_element(xml, tag, value)?;
        }
    }

    if let Some(extensions) = wpt.extensions.as_deref().filter(|e| !e.is_empty()) {
        xml.write_event(Event::Start(BytesStart::new("extensions")))?;
        for ext in extensions {
            write_element(xml, &ext.to_element())?;
        }
        xml.write_event(Event::End(BytesEnd::new("extensions")))?;
    }

    xml.write_event(Event::End(BytesEnd::new("wpt")))?;
    Ok(())
}

fn write_text_element<W: Write>(xml: &mut Writer<W>, tag: &str, text: &str) -> Result<(), WaypointError> {
    xml.write_event(Event::Start(BytesStart::new(tag)))?;
    xml.write_event(Event::Text(BytesText::new(text)))?;
    xml.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn write_element<W: Write>(xml: &mut Writer<W>, element: &Element) -> Result<(), WaypointError> {
    let name = element.name.as_str();

    if element.children.is_empty() {
        return match element.text.as_deref() {
            Some(text) => write_text_element(xml, name, text),
            None => {
                xml.write_event(Event::Empty(BytesStart::new(name)))?;
                Ok(())
            }
        };
    }

    xml.write_event(Event::Start(BytesStart::new(name)))?;
    if let Some(text) = element.text.as_deref() {
        xml.write_event(Event::Text(BytesText::new(text)))?;
    }
    for child in &element.children {
        write_element(xml, child)?;
    }
    xml.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
