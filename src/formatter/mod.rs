// Response formatter
// Normalises every branch's output into one fixed JSON shape


use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::debugging::DebugAnalysis;
use crate::llm::StructuredResponse;

pub const PLACEHOLDER_CODE: &str = "// Example code snippet";
pub const NO_SNIPPET: &str = "print('No snippet generated')";
pub const UNKNOWN_DIFFICULTY: &str = "Unknown";

/// Passages containing one of these are taken to carry code
const CODE_MARKERS: [&str; 3] = ["public class", "foreach", "Blueprint"];
const SNIPPET_LINES: usize = 20;

struct CodeTemplate {
    /// Every keyword must occur in the lowercased backend payload
    keywords: [&'static str; 2],
    code: &'static str,
}

const CODE_TEMPLATES: &[CodeTemplate] = &[
    CodeTemplate {
        keywords: ["teleport", "unity"],
        code: r"using UnityEngine;
using UnityEngine.XR.Interaction.Toolkit;

public class TeleportSetup : MonoBehaviour
{
    public XRInteractionManager interactionManager;
    public TeleportationProvider teleportationProvider;

    void Start()
    {
        if (teleportationProvider == null)
        {
            teleportationProvider = FindObjectOfType<TeleportationProvider>();
        }
    }

    public void SetupTeleportArea(GameObject floor)
    {
        var area = floor.AddComponent<TeleportationArea>();
        area.teleportationProvider = teleportationProvider;
    }
}",
    },
    CodeTemplate {
        keywords: ["snap turn", "unity"],
        code: r"using UnityEngine;
using UnityEngine.XR.Interaction.Toolkit;

public class SnapTurnSetup : MonoBehaviour
{
    public ActionBasedSnapTurnProvider snapTurnProvider;

    void Start()
    {
        if (snapTurnProvider == null)
        {
            snapTurnProvider = FindObjectOfType<ActionBasedSnapTurnProvider>();
        }
        snapTurnProvider.turnAmount = 45f; // degrees per snap
    }
}",
    },
    CodeTemplate {
        keywords: ["unreal", "teleport"],
        code: r"// Unreal Engine Blueprint pseudocode:
// 1. Add NavMeshBoundsVolume in level
// 2. Enable 'Teleport' in MotionControllerPawn
// 3. Bind controller input to 'TeleportAction'
// 4. Use 'Teleport To' node with destination from Trace",
    },
];

/// The response shape shared by the HTTP and CLI surfaces
///
/// Every key is always present; absent inputs become empty values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedResponse {
    pub status: String,
    pub subtasks: Vec<String>,
    pub code: String,
    pub gotchas: Vec<String>,
    pub best_practices: Vec<String>,
    pub difficulty: String,
    pub docs_link: String,
    pub raw: Value,
    pub search_results: Value,
    pub retrieved_docs: Vec<String>,
    pub debug: Value,
}

impl FormattedResponse {
    /// Code to show as the answer's snippet
    #[inline]
    pub fn snippet(&self) -> &str {
        if self.code.trim().is_empty() {
            NO_SNIPPET
        } else {
            &self.code
        }
    }

    /// JSON object with an added `snippet` string
    #[inline]
    pub fn with_snippet(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or_else(|_| json!({}));
        if let Value::Object(map) = &mut value {
            map.insert("snippet".to_string(), Value::String(self.snippet().to_string()));
        }
        value
    }
}

/// Merge the parts of an answer into a [`FormattedResponse`]
#[inline]
pub fn format_response(
    structured: &StructuredResponse,
    search_results: Option<&Value>,
    debug: Option<&DebugAnalysis>,
    retrieved_docs: Option<&[String]>,
) -> FormattedResponse {
    let difficulty = if structured.difficulty.trim().is_empty() {
        UNKNOWN_DIFFICULTY.to_string()
    } else {
        structured.difficulty.clone()
    };

    FormattedResponse {
        status: "success".to_string(),
        subtasks: structured.subtasks.clone(),
        code: select_code(structured, retrieved_docs),
        gotchas: structured.gotchas.clone(),
        best_practices: structured.best_practices.clone(),
        difficulty,
        docs_link: structured.docs_link.clone(),
        raw: object_or_empty(Some(&structured.raw)),
        search_results: object_or_empty(search_results),
        retrieved_docs: retrieved_docs.map(<[String]>::to_vec).unwrap_or_default(),
        debug: debug
            .and_then(|analysis| serde_json::to_value(analysis).ok())
            .unwrap_or_else(empty_object),
    }
}

/// Pick the code to show, first match wins
///
/// 1. The first 20 lines of the first retrieved passage that carries code.
/// 2. A template whose keywords all occur in the backend payload.
/// 3. Code supplied by the backend, else a generic placeholder.
#[inline]
pub fn select_code(structured: &StructuredResponse, retrieved_docs: Option<&[String]>) -> String {
    if let Some(passage) = retrieved_docs
        .unwrap_or_default()
        .iter()
        .find(|doc| CODE_MARKERS.iter().any(|marker| doc.contains(marker)))
    {
        return passage
            .lines()
            .take(SNIPPET_LINES)
            .collect::<Vec<_>>()
            .join("\n");
    }

    let payload = match &structured.raw {
        Value::String(text) => text.to_lowercase(),
        Value::Null => String::new(),
        other => other.to_string().to_lowercase(),
    };
    if let Some(template) = CODE_TEMPLATES
        .iter()
        .find(|template| template.keywords.iter().all(|k| payload.contains(k)))
    {
        return template.code.to_string();
    }

    if structured.code.trim().is_empty() {
        PLACEHOLDER_CODE.to_string()
    } else {
        structured.code.clone()
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Null and missing values become `{}`
fn object_or_empty(value: Option<&Value>) -> Value {
    match value {
        None | Some(Value::Null) => empty_object(),
        Some(other) => other.clone(),
    }
}
