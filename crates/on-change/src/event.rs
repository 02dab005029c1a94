use on_change_path::Path;
use serde_json::json;

use crate::value::Value;

/// What triggered an aggregate change, when details are enabled for it.
#[derive(Clone, Debug)]
pub struct OperationDetails {
    pub name: String,
    pub args: Vec<Value>,
    pub result: Value,
}

/// One reported mutation.
///
/// For property writes `value` is the value now stored and `previous` the
/// one it replaced (`Undefined` when absent). For aggregate operations both
/// refer to the whole collection: `value` is the live collection and
/// `previous` a clone taken before the call.
#[derive(Clone, Debug)]
pub struct Change {
    pub path: Path,
    pub value: Value,
    pub previous: Value,
    pub details: Option<OperationDetails>,
}

impl Change {
    pub fn to_json(&self) -> serde_json::Value {
        let mut out = json!({
            "path": self.path,
            "value": self.value.to_json(),
            "previous": self.previous.to_json(),
        });
        if let Some(details) = &self.details {
            out["details"] = json!({
                "name": details.name,
                "args": details.args.iter().map(Value::to_json).collect::<Vec<_>>(),
                "result": details.result.to_json(),
            });
        }
        out
    }
}
