use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use url::Url;

/// Raw outputs of a succeeded request.
///
/// First key is the output node id, second key is the output type, the
/// value depends on the output type. How many nodes there are and which of
/// them emit what varies per deployed workflow, so everything below the two
/// key levels stays an opaque [`Value`].
///
/// Ex:
///
/// ```json
/// {
///     "38:42": {
///         "text": [["Transform to an elephant, wearing a pearl tiara..."]]
///     },
///     "58": {
///         "images": {
///             "filename": "ComfyUI_00010_.png",
///             "subfolder": "",
///             "type": "output",
///             "url": "https://serverless-api-storage.runcomfy.net/output/..../ComfyUI_00010_.png"
///         }
///     }
/// }
/// ```
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct Outputs(pub HashMap<String, HashMap<String, Value>>);

impl Outputs {
    /// Loop through the outputs and collect any image contained within.
    ///
    /// Best-effort scan, not a strict decode: an entry is kept only when
    /// its `url` field parses, every other malformed or missing field is
    /// skipped silently. The output schema is not uniformly typed across
    /// workflows.
    pub fn extract_images(&self) -> Vec<ImageOutput> {
        // 99% of the time we will be getting one image from the remote workflow
        let mut images = Vec::with_capacity(1);
        for (node_id, node_output) in &self.0 {
            for (output_type, payload) in node_output {
                if output_type != "images" {
                    continue;
                }
                let Some(fields) = payload.as_object() else {
                    continue;
                };
                let url = fields
                    .get("url")
                    .and_then(Value::as_str)
                    .and_then(|raw| Url::parse(raw).ok());
                let Some(url) = url else {
                    log::debug!("node {node_id} image output has no usable url, skipping");
                    continue;
                };
                images.push(ImageOutput {
                    from_node_id: node_id.clone(),
                    filename: string_field(fields, "filename"),
                    subfolder: string_field(fields, "subfolder"),
                    kind: string_field(fields, "type"),
                    url,
                });
            }
        }
        images
    }
}

fn string_field(fields: &serde_json::Map<String, Value>, key: &str) -> String {
    fields
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// One image produced by an output node of the workflow.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImageOutput {
    pub from_node_id: String,
    pub filename: String,
    pub subfolder: String,
    /// Raw `type` tag of the entry, usually `"output"`.
    pub kind: String,
    pub url: Url,
}
