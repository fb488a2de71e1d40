use super::window::ActiveWindow;
use crate::error::{LockError, Result};
use serde_json::Value;
use std::process::Command;

pub struct SwayProbe;

impl SwayProbe {
    pub fn new() -> Self {
        Self
    }

    fn get_tree() -> Result<Value> {
        let output = Command::new("swaymsg")
            .args(["-t", "get_tree", "-r"])
            .output()
            .map_err(|e| LockError::ServiceUnavailable(format!("swaymsg не найден: {}", e)))?;

        if !output.status.success() {
            return Err(LockError::ServiceUnavailable("swaymsg вернул ошибку".to_string()));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| LockError::ServiceUnavailable(format!("Некорректное дерево sway: {}", e)))
    }

    pub async fn test(&self) -> Result<()> {
        Self::get_tree().map(|_| ())
    }

    pub async fn get_active_window(&self) -> Result<ActiveWindow> {
        let tree = Self::get_tree()?;
        find_focused(&tree)
            .ok_or_else(|| LockError::ServiceUnavailable("Активное окно в Sway не найдено".to_string()))
    }
}

fn find_focused(node: &Value) -> Option<ActiveWindow> {
    if node.get("focused").and_then(Value::as_bool) == Some(true) {
        return Some(window_from_node(node));
    }

    ["nodes", "floating_nodes"]
        .iter()
        .filter_map(|key| node.get(*key).and_then(Value::as_array))
        .flatten()
        .find_map(find_focused)
}

fn window_from_node(node: &Value) -> ActiveWindow {
    let title = node.get("name").and_then(Value::as_str).unwrap_or_default();
    let mut window = ActiveWindow::new(title);

    if let Some(pid) = node.get("pid").and_then(Value::as_u64) {
        if let Ok(pid) = u32::try_from(pid) {
            window = window.with_pid(pid);
        }
    }

    if let Some(app_id) = node.get("app_id").and_then(Value::as_str) {
        window = window.with_app_id(app_id);
    }

    // XWayland окна несут класс в window_properties, нативные - только app_id
    let class = node
        .get("window_properties")
        .and_then(|props| props.get("class"))
        .and_then(Value::as_str)
        .or_else(|| node.get("app_id").and_then(Value::as_str));
    if let Some(class) = class {
        window = window.with_class(class);
    }

    window
}
