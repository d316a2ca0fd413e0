//! XML codec
//!
//! Encode/decode pairs for the three document types exchanged with the
//! accounting system.
//!
//! # Namespace rewrite
//!
//! The external schema expects the oppdrag namespace as the default
//! namespace on the root element:
//!
//! ```xml
//! <oppdrag xmlns="http://www.trygdeetaten.no/skjema/oppdrag">...</oppdrag>
//! ```
//!
//! Receipts may come back in prefixed form
//! (`<ns2:oppdrag xmlns:ns2="...">...</ns2:oppdrag>`). Decoding strips the
//! root element's prefix and attributes before binding, and encoding adds
//! the default namespace back, so `decode(encode(x)) == x`. Child elements
//! are unqualified in both forms.
//!
//! # Whitespace
//!
//! The decoder trims text content. Encoding writes leading and trailing
//! whitespace of text content as character references, which survive the
//! trim, so identifiers and message texts round-trip exactly.

use crate::{
    avstemmingsdata::{Avstemmingsdata, Konsistensdata, SendKonsistensavstemmingsdata},
    error::{Error, Result},
    model::Oppdrag,
};
use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::{de::DeserializeOwned, Serialize};

/// Namespace of the oppdrag document
pub const OPPDRAG_NAMESPACE: &str = "http://www.trygdeetaten.no/skjema/oppdrag";

const ROT_OPPDRAG: &str = "oppdrag";
const ROT_AVSTEMMINGSDATA: &str = "avstemmingsdata";
const ROT_KONSISTENS: &str = "sendAsynkronKonsistensavstemmingsdata";

/// Encode an oppdrag in the external namespace form
pub fn encode_oppdrag(oppdrag: &Oppdrag) -> Result<String> {
    let xml = serialize(oppdrag)?;
    let innhold = xml
        .strip_prefix("<oppdrag>")
        .ok_or_else(|| Error::Encode(format!("Unexpected root element in {}", xml)))?;
    Ok(format!("<oppdrag xmlns=\"{}\">{}", OPPDRAG_NAMESPACE, innhold))
}

/// Decode an oppdrag or kvittering
pub fn decode_oppdrag(xml: &str) -> Result<Oppdrag> {
    deserialize(xml, ROT_OPPDRAG)
}

/// Encode a grensesnittavstemming message
pub fn encode_avstemmingsdata(data: &Avstemmingsdata) -> Result<String> {
    serialize(data)
}

/// Decode a grensesnittavstemming message
pub fn decode_avstemmingsdata(xml: &str) -> Result<Avstemmingsdata> {
    deserialize(xml, ROT_AVSTEMMINGSDATA)
}

/// Encode a konsistensavstemming message
pub fn encode_konsistensdata(data: &Konsistensdata) -> Result<String> {
    serialize(&SendKonsistensavstemmingsdata {
        konsistensavstemmingsdata: data.clone(),
    })
}

/// Decode a konsistensavstemming message
pub fn decode_konsistensdata(xml: &str) -> Result<Konsistensdata> {
    let envelope: SendKonsistensavstemmingsdata = deserialize(xml, ROT_KONSISTENS)?;
    Ok(envelope.konsistensavstemmingsdata)
}

fn serialize<T: Serialize>(value: &T) -> Result<String> {
    let xml = quick_xml::se::to_string(value).map_err(|e| Error::Encode(e.to_string()))?;
    bevar_kantmellomrom(&xml)
}

/// Rewrite edge whitespace of every text node as character references
fn bevar_kantmellomrom(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::Encode(e.to_string()))?;
        let skrevet = match event {
            Event::Eof => break,
            Event::Text(tekst) => {
                let raw = std::str::from_utf8(&tekst).map_err(|e| Error::Encode(e.to_string()))?;
                writer.write_event(Event::Text(BytesText::from_escaped(referer_kanter(raw))))
            }
            annet => writer.write_event(annet),
        };
        skrevet.map_err(|e| Error::Encode(e.to_string()))?;
    }

    String::from_utf8(writer.into_inner()).map_err(|e| Error::Encode(e.to_string()))
}

fn er_xml_mellomrom(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// `raw` is already escaped; only its edges change
fn referer_kanter(raw: &str) -> String {
    let uten_start = raw.trim_start_matches(er_xml_mellomrom);
    let innhold = uten_start.trim_end_matches(er_xml_mellomrom);
    let start = &raw[..raw.len() - uten_start.len()];
    let slutt = &uten_start[innhold.len()..];

    if start.is_empty() && slutt.is_empty() {
        return raw.to_string();
    }

    let mut ut = String::with_capacity(raw.len() + 5 * (start.len() + slutt.len()));
    ut.extend(start.chars().map(|c| format!("&#{};", c as u32)));
    ut.push_str(innhold);
    ut.extend(slutt.chars().map(|c| format!("&#{};", c as u32)));
    ut
}

fn deserialize<T: DeserializeOwned>(xml: &str, rot: &str) -> Result<T> {
    let normalisert = normaliser_rot(xml, rot)?;
    Ok(quick_xml::de::from_str(&normalisert)?)
}

/// Strip declaration, root prefix and root attributes
fn normaliser_rot(xml: &str, rot: &str) -> Result<String> {
    let mut body = xml.trim();

    if let Some(rest) = body.strip_prefix("<?xml") {
        let slutt = rest
            .find("?>")
            .ok_or_else(|| Error::Decode("Unterminated XML declaration".to_string()))?;
        body = rest[slutt + 2..].trim_start();
    }

    if !body.starts_with('<') {
        return Err(Error::Decode("Payload is not an XML document".to_string()));
    }
    let start_slutt = body
        .find('>')
        .ok_or_else(|| Error::Decode("Unterminated root element".to_string()))?;
    let start_tag = &body[1..start_slutt];

    let selvlukkende = start_tag.ends_with('/');
    let navn = start_tag
        .trim_end_matches('/')
        .split_whitespace()
        .next()
        .unwrap_or_default();
    let lokalt_navn = navn.rsplit(':').next().unwrap_or(navn);

    if lokalt_navn != rot {
        return Err(Error::Decode(format!(
            "Expected root element <{}>, found <{}>",
            rot, navn
        )));
    }

    if selvlukkende {
        return Ok(format!("<{}/>", rot));
    }

    let slutt_tag = format!("</{}>", navn);
    let innhold = body[start_slutt + 1..]
        .trim_end()
        .strip_suffix(slutt_tag.as_str())
        .ok_or_else(|| Error::Decode(format!("Missing closing tag {}", slutt_tag)))?;

    Ok(format!("<{}>{}</{}>", rot, innhold, rot))
}
