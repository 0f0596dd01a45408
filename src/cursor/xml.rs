//! XML export of a cursor's records.

use super::Cursor;
use crate::models::Value;

const XML_NAMESPACE: &str = "http://www.dabodev.com";

/// Renders the cursor as a `dabocursor` document.
///
/// Every record becomes a `<row>` and every field a `<column>` carrying the
/// field name and value type. Text containing `<`, `&` or a newline is
/// wrapped in CDATA.
pub(super) fn cursor_to_xml(cursor: &Cursor) -> String {
    let mut rows = String::new();
    for rec in cursor.data_set() {
        rows.push_str("\t\t<row>\n");
        let columns: Vec<String> = rec
            .fields()
            .iter()
            .map(|(name, value)| {
                format!(
                    "\t\t\t<column name=\"{}\" type=\"{}\">{}</column>",
                    escape_attr(name),
                    value.type_name(),
                    escape_value(value)
                )
            })
            .collect();
        rows.push_str(&columns.join("\n"));
        rows.push_str("\n\t\t</row>\n");
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"{encoding}\"?>\n\
         <dabocursor xmlns=\"{XML_NAMESPACE}\"\n\
         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\"\n\
         xsi:schemaLocation=\"http://www.dabodev.com dabocursor.xsd\"\n\
         xsi:noNamespaceSchemaLocation=\"http://dabodev.com/schema/dabocursor.xsd\">\n\
         \t<cursor autopopulate=\"{autopopulate}\" keyfield=\"{keyfield}\" table=\"{table}\">\n\
         {rows}\
         \t</cursor>\n\
         </dabocursor>",
        encoding = cursor.backend().encoding(),
        autopopulate = cursor.auto_populate_pk(),
        keyfield = escape_attr(cursor.key_field()),
        table = escape_attr(cursor.table()),
    )
}

fn escape_value(value: &Value) -> String {
    let text = value.to_string();
    let needs_cdata = matches!(value, Value::Text(_) | Value::Decimal(_))
        && (text.contains('<') || text.contains('&') || text.contains('\n'));
    if needs_cdata {
        format!("<![CDATA[{}]]>", text.replace("]]>", "]]]]><![CDATA[>"))
    } else {
        text
    }
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
