//! Vehicle-data extraction from listing descriptions.
//!
//! Part listings embed a `cpcm_info` block in their free-text HTML
//! description, one `<li id="cpcm_info-…">` per field with the value inside
//! a `.cpcm_label-content` span. The primary path parses the DOM; a regex
//! pass over the raw text covers descriptions whose markup the parser cannot
//! see, such as blocks hidden inside template scripts.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

/// Donor-vehicle data mined from a listing description. String fields are
/// empty when the description does not carry them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VehicleData {
    pub year: String,
    pub model: String,
    pub vin: String,
    /// Free-form description of the donor vehicle.
    pub vehicle_info: String,
    /// Condition notes for the part itself.
    pub notes: String,
    /// Interchange list, one compatible vehicle per entry.
    pub also_fits: Vec<String>,
    /// The interchange entries before splitting, newline-joined.
    pub also_fits_raw: String,
}

impl VehicleData {
    fn is_empty(&self) -> bool {
        self.year.is_empty()
            && self.model.is_empty()
            && self.vin.is_empty()
            && self.vehicle_info.is_empty()
            && self.notes.is_empty()
            && self.also_fits.is_empty()
    }
}

/// Extracts vehicle data from a listing description.
///
/// Tries the DOM first and falls back to regex scanning when no `cpcm_info`
/// field is reachable through the parsed tree.
#[must_use]
pub fn extract_vehicle_data(html: &str) -> VehicleData {
    if html.trim().is_empty() {
        return VehicleData::default();
    }

    let data = extract_from_dom(html);
    if data.is_empty() {
        return extract_with_regex(html);
    }
    data
}

fn extract_from_dom(html: &str) -> VehicleData {
    let document = Html::parse_document(html);
    let (also_fits, also_fits_raw) = dom_also_fits(&document);
    VehicleData {
        year: dom_field(&document, "year"),
        model: dom_field(&document, "model"),
        vin: dom_field(&document, "vin"),
        vehicle_info: dom_field(&document, "autDesc"),
        notes: dom_field(&document, "description"),
        also_fits,
        also_fits_raw,
    }
}

fn content_element<'a>(document: &'a Html, id: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(&format!("#cpcm_info-{id} .cpcm_label-content")).ok()?;
    document.select(&selector).next()
}

fn dom_field(document: &Html, id: &str) -> String {
    content_element(document, id)
        .map(|element| normalize_ws(&element.text().collect::<String>()))
        .unwrap_or_default()
}

/// Splits the interchange element into entries on `<br>` and `<li>`
/// boundaries by walking its nodes in document order.
fn dom_also_fits(document: &Html) -> (Vec<String>, String) {
    let Some(element) = content_element(document, "interchange") else {
        return (Vec::new(), String::new());
    };

    let mut entries = Vec::new();
    let mut current = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(text) => current.push_str(text),
            Node::Element(el) if el.name() == "br" || el.name() == "li" => {
                push_entry(&mut entries, &mut current);
            }
            _ => {}
        }
    }
    push_entry(&mut entries, &mut current);

    let raw = entries.join("\n");
    (entries, raw)
}

fn push_entry(entries: &mut Vec<String>, current: &mut String) {
    let entry = normalize_ws(current);
    if !entry.is_empty() {
        entries.push(entry);
    }
    current.clear();
}

static BR_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"));
static LI_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<li\b[^>]*>").expect("valid regex"));
static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

fn extract_with_regex(html: &str) -> VehicleData {
    let (also_fits, also_fits_raw) = regex_also_fits(html);
    VehicleData {
        year: regex_field(html, "year"),
        model: regex_field(html, "model"),
        vin: regex_field(html, "vin"),
        vehicle_info: regex_field(html, "autDesc"),
        notes: regex_field(html, "description"),
        also_fits,
        also_fits_raw,
    }
}

/// Raw inner HTML of the `cpcm_label-content` span for one field id.
fn raw_field(html: &str, id: &str) -> Option<String> {
    let pattern = format!(
        r#"(?is)<li[^>]*\bid=["']cpcm_info-{id}["'][^>]*>.*?<span[^>]*\bclass=["'][^"']*cpcm_label-content[^"']*["'][^>]*>(.*?)</span>"#
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn regex_field(html: &str, id: &str) -> String {
    raw_field(html, id)
        .map(|raw| {
            let spaced = BR_TAG.replace_all(&raw, " ");
            let stripped = ANY_TAG.replace_all(&spaced, " ");
            normalize_ws(&stripped)
        })
        .unwrap_or_default()
}

fn regex_also_fits(html: &str) -> (Vec<String>, String) {
    let Some(raw) = raw_field(html, "interchange") else {
        return (Vec::new(), String::new());
    };

    let lined = BR_TAG.replace_all(&raw, "\n");
    let lined = LI_TAG.replace_all(&lined, "\n");
    let stripped = ANY_TAG.replace_all(&lined, " ");
    let entries: Vec<String> = stripped
        .split('\n')
        .map(normalize_ws)
        .filter(|entry| !entry.is_empty())
        .collect();

    let raw_joined = entries.join("\n");
    (entries, raw_joined)
}

fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpcm_block() -> &'static str {
        r#"<div class="cpcm_wrap"><ul>
          <li id="cpcm_info-year"><span class="cpcm_label">Year:</span><span class="cpcm_label-content">2015</span></li>
          <li id="cpcm_info-model"><span class="cpcm_label">Model:</span><span class="cpcm_label-content">Silverado  1500</span></li>
          <li id="cpcm_info-vin"><span class="cpcm_label">VIN:</span><span class="cpcm_label-content">3GCUKREC5FG123456</span></li>
          <li id="cpcm_info-autDesc"><span class="cpcm_label">Vehicle:</span><span class="cpcm_label-content">2015 Silverado <b>5.3L</b> 4x4</span></li>
          <li id="cpcm_info-description"><span class="cpcm_label">Notes:</span><span class="cpcm_label-content">Minor scratches, tested</span></li>
          <li id="cpcm_info-interchange"><span class="cpcm_label">Also fits:</span><span class="cpcm_label-content">2014-2018 Silverado<br>2015-2020 Tahoe<br/>2015-2020 Suburban</span></li>
        </ul></div>"#
    }

    #[test]
    fn extracts_all_fields_from_well_formed_markup() {
        let data = extract_vehicle_data(cpcm_block());
        assert_eq!(data.year, "2015");
        assert_eq!(data.model, "Silverado 1500");
        assert_eq!(data.vin, "3GCUKREC5FG123456");
        assert_eq!(data.vehicle_info, "2015 Silverado 5.3L 4x4");
        assert_eq!(data.notes, "Minor scratches, tested");
        assert_eq!(
            data.also_fits,
            [
                "2014-2018 Silverado",
                "2015-2020 Tahoe",
                "2015-2020 Suburban"
            ]
        );
        assert_eq!(
            data.also_fits_raw,
            "2014-2018 Silverado\n2015-2020 Tahoe\n2015-2020 Suburban"
        );
    }

    #[test]
    fn dom_and_regex_paths_agree_on_well_formed_markup() {
        let html = cpcm_block();
        assert_eq!(extract_from_dom(html), extract_with_regex(html));
    }

    #[test]
    fn falls_back_to_regex_when_the_parser_cannot_see_the_block() {
        // Sellers sometimes ship the block inside a template script, where
        // the HTML parser treats it as raw text.
        let html = format!(
            r#"<div>desc</div><script type="text/template">{}</script>"#,
            cpcm_block()
        );

        let data = extract_vehicle_data(&html);
        assert_eq!(data.year, "2015");
        assert_eq!(data.also_fits.len(), 3);
    }

    #[test]
    fn interchange_split_handles_nested_list_items() {
        let html = r#"<li id="cpcm_info-interchange"><span class="cpcm_label-content"><ul><li>2014 Sierra</li><li>2015 Yukon XL</li></ul></span></li>"#;

        let dom = extract_from_dom(html);
        assert_eq!(dom.also_fits, ["2014 Sierra", "2015 Yukon XL"]);

        let regex = extract_with_regex(html);
        assert_eq!(regex.also_fits, dom.also_fits);
    }

    #[test]
    fn missing_fields_stay_empty() {
        let html = r#"<li id="cpcm_info-year"><span class="cpcm_label-content">1998</span></li>"#;
        let data = extract_vehicle_data(html);
        assert_eq!(data.year, "1998");
        assert_eq!(data.model, "");
        assert!(data.also_fits.is_empty());
    }

    #[test]
    fn empty_input_returns_the_empty_value() {
        assert_eq!(extract_vehicle_data(""), VehicleData::default());
        assert_eq!(extract_vehicle_data("   \n "), VehicleData::default());
    }

    #[test]
    fn plain_descriptions_yield_nothing() {
        let data = extract_vehicle_data("<p>Great part, fast shipping!</p>");
        assert_eq!(data, VehicleData::default());
    }
}
