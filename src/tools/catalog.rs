//! The fixed browser tool catalog advertised to the model.

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value};

use crate::llm::ToolSchema;

/// What a tool does to the browser, as far as cached state is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolEffect {
    /// Changes the current page (updates the last target)
    Navigates,
    /// Reads the page structure (updates the last snapshot)
    Observes,
    Interacts,
    Captures,
    Waits,
    Evaluates,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrowserTool {
    Navigate,
    Snapshot,
    Click,
    Type,
    TakeScreenshot,
    PressKey,
    Hover,
    SelectOption,
    WaitFor,
    Evaluate,
}

impl BrowserTool {
    /// Catalog order, which is also the order advertised to the model.
    pub const ALL: [BrowserTool; 10] = [
        BrowserTool::Navigate,
        BrowserTool::Snapshot,
        BrowserTool::Click,
        BrowserTool::Type,
        BrowserTool::TakeScreenshot,
        BrowserTool::PressKey,
        BrowserTool::Hover,
        BrowserTool::SelectOption,
        BrowserTool::WaitFor,
        BrowserTool::Evaluate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BrowserTool::Navigate => "browser_navigate",
            BrowserTool::Snapshot => "browser_snapshot",
            BrowserTool::Click => "browser_click",
            BrowserTool::Type => "browser_type",
            BrowserTool::TakeScreenshot => "browser_take_screenshot",
            BrowserTool::PressKey => "browser_press_key",
            BrowserTool::Hover => "browser_hover",
            BrowserTool::SelectOption => "browser_select_option",
            BrowserTool::WaitFor => "browser_wait_for",
            BrowserTool::Evaluate => "browser_evaluate",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            BrowserTool::Navigate => "Navigate to a URL in the browser",
            BrowserTool::Snapshot => "Get the accessibility tree snapshot of the current page, showing all interactive elements with their ref identifiers",
            BrowserTool::Click => "Click an element on the page using its ref identifier from the snapshot",
            BrowserTool::Type => "Type text into an input field using its ref identifier",
            BrowserTool::TakeScreenshot => "Take a screenshot of the current page",
            BrowserTool::PressKey => "Press a key on the keyboard (e.g., Enter, Escape, ArrowDown)",
            BrowserTool::Hover => "Hover over an element on the page",
            BrowserTool::SelectOption => "Select an option in a dropdown",
            BrowserTool::WaitFor => "Wait for text to appear or disappear, or wait for a specified time",
            BrowserTool::Evaluate => "Evaluate JavaScript expression on page",
        }
    }

    pub fn effect(self) -> ToolEffect {
        match self {
            BrowserTool::Navigate => ToolEffect::Navigates,
            BrowserTool::Snapshot => ToolEffect::Observes,
            BrowserTool::Click
            | BrowserTool::Type
            | BrowserTool::PressKey
            | BrowserTool::Hover
            | BrowserTool::SelectOption => ToolEffect::Interacts,
            BrowserTool::TakeScreenshot => ToolEffect::Captures,
            BrowserTool::WaitFor => ToolEffect::Waits,
            BrowserTool::Evaluate => ToolEffect::Evaluates,
        }
    }

    /// JSON schema of the argument object.
    pub fn parameters_schema(self) -> Value {
        match self {
            BrowserTool::Navigate => json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "The URL to navigate to (e.g., https://google.com)"
                    }
                },
                "required": ["url"]
            }),
            BrowserTool::Snapshot => json!({
                "type": "object",
                "properties": {}
            }),
            BrowserTool::Click | BrowserTool::Hover => json!({
                "type": "object",
                "properties": {
                    "ref": {
                        "type": "string",
                        "description": "The ref identifier of the element (e.g., 'e46')"
                    },
                    "element": {
                        "type": "string",
                        "description": "Human-readable description of the element"
                    }
                },
                "required": ["ref", "element"]
            }),
            BrowserTool::Type => json!({
                "type": "object",
                "properties": {
                    "ref": {
                        "type": "string",
                        "description": "The ref identifier of the input field"
                    },
                    "text": {
                        "type": "string",
                        "description": "The text to type"
                    },
                    "element": {
                        "type": "string",
                        "description": "Human-readable description of the element"
                    }
                },
                "required": ["ref", "text", "element"]
            }),
            BrowserTool::TakeScreenshot => json!({
                "type": "object",
                "properties": {
                    "type": {
                        "type": "string",
                        "enum": ["png", "jpeg"],
                        "description": "Image format for the screenshot"
                    }
                },
                "required": ["type"]
            }),
            BrowserTool::PressKey => json!({
                "type": "object",
                "properties": {
                    "key": {
                        "type": "string",
                        "description": "Name of the key to press (e.g., 'Enter', 'Escape', 'ArrowLeft')"
                    }
                },
                "required": ["key"]
            }),
            BrowserTool::SelectOption => json!({
                "type": "object",
                "properties": {
                    "ref": {"type": "string", "description": "The ref identifier of the dropdown"},
                    "values": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Values to select"
                    },
                    "element": {"type": "string", "description": "Human-readable description"}
                },
                "required": ["ref", "values", "element"]
            }),
            BrowserTool::WaitFor => json!({
                "type": "object",
                "properties": {
                    "text": {"type": "string", "description": "Text to wait for"},
                    "textGone": {"type": "string", "description": "Text to wait to disappear"},
                    "time": {"type": "number", "description": "Time to wait in seconds"}
                }
            }),
            BrowserTool::Evaluate => json!({
                "type": "object",
                "properties": {
                    "function": {"type": "string", "description": "JavaScript function to execute"}
                },
                "required": ["function"]
            }),
        }
    }

    pub fn schema(self) -> ToolSchema {
        ToolSchema::function(self.name(), self.description(), self.parameters_schema())
    }

    /// Check `args` against this tool's schema.
    ///
    /// Covers the object shape, required fields, declared primitive types,
    /// array item types and enums. Undeclared properties pass through.
    pub fn validate(self, args: &Value) -> Result<(), String> {
        let Some(object) = args.as_object() else {
            return Err("arguments must be a JSON object".to_string());
        };

        let schema = self.parameters_schema();

        if let Some(required) = schema["required"].as_array() {
            for field in required.iter().filter_map(Value::as_str) {
                if object.get(field).map_or(true, Value::is_null) {
                    return Err(format!("missing required field '{}'", field));
                }
            }
        }

        if let Some(properties) = schema["properties"].as_object() {
            for (field, property) in properties {
                let Some(value) = object.get(field).filter(|v| !v.is_null()) else {
                    continue;
                };
                check_type(field, property, value)?;
            }
        }

        Ok(())
    }
}

fn check_type(field: &str, schema: &Value, value: &Value) -> Result<(), String> {
    let expected = schema["type"].as_str().unwrap_or("any");
    let matches = match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    };
    if !matches {
        return Err(format!("field '{}' must be of type {}", field, expected));
    }

    if let Some(allowed) = schema["enum"].as_array() {
        if !allowed.contains(value) {
            let options = allowed
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(format!("field '{}' must be one of: {}", field, options));
        }
    }

    if let (Some(items), Some(item_schema)) = (value.as_array(), schema.get("items")) {
        for item in items {
            check_type(&format!("{}[]", field), item_schema, item)?;
        }
    }

    Ok(())
}

impl fmt::Display for BrowserTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BrowserTool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BrowserTool::ALL
            .into_iter()
            .find(|tool| tool.name() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Schemas for every catalog tool, in catalog order.
pub fn tool_schemas() -> Vec<ToolSchema> {
    BrowserTool::ALL.into_iter().map(BrowserTool::schema).collect()
}
