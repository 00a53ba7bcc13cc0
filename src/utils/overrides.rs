//! `KEY=VALUE` override parsing for command-line parameters and options.
//!
//! Keys may be dotted paths (`override_settings.CLIP_stop_at_last_layers=2`);
//! intermediate objects are created as needed.
use serde_json::{json, Map, Value};

pub fn parse_set_pairs(items: &[String]) -> Result<Vec<(Vec<String>, Value)>, String> {
    let mut out = Vec::new();
    for s in items {
        let Some((k, val)) = s.split_once('=') else {
            return Err(format!("Invalid --set '{}', expected KEY=VALUE", s));
        };
        let key_path: Vec<String> = k.split('.').map(|p| p.trim().to_string()).collect();
        if key_path.iter().any(|p| p.is_empty()) {
            return Err(format!("Invalid --set '{}', empty key segment", s));
        }
        out.push((key_path, parse_value(val)));
    }
    Ok(out)
}

pub fn parse_value(src: &str) -> Value {
    if let Ok(v) = serde_json::from_str::<Value>(src) { return v; }
    if src.eq_ignore_ascii_case("null") { return Value::Null; }
    if src.eq_ignore_ascii_case("true") { return Value::Bool(true); }
    if src.eq_ignore_ascii_case("false") { return Value::Bool(false); }
    if let Ok(i) = src.parse::<i64>() { return Value::from(i); }
    // `inf` and `NaN` parse as f64 but have no JSON form; keep them as text.
    if let Ok(f) = src.parse::<f64>() {
        if f.is_finite() { return json!(f); }
    }
    Value::String(src.to_string())
}

/// Set `path` inside `root`, creating objects along the way.
///
/// Fails (returns false) when a non-object value sits on the path.
pub fn apply_set_path(root: &mut Map<String, Value>, path: &[String], new_val: Value) -> bool {
    let Some((last, parents)) = path.split_last() else { return false };
    let mut cur = root;
    for key in parents {
        let next = cur.entry(key.clone()).or_insert_with(|| Value::Object(Map::new()));
        match next {
            Value::Object(map) => cur = map,
            _ => return false,
        }
    }
    cur.insert(last.clone(), new_val);
    true
}

/// Parse and apply every pair, reporting the first path that could not be set.
pub fn apply_set_pairs(root: &mut Map<String, Value>, items: &[String]) -> Result<(), String> {
    for (path, value) in parse_set_pairs(items)? {
        if !apply_set_path(root, &path, value) {
            return Err(format!("could not apply --set to path: {}", path.join(".")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_types() {
        assert_eq!(parse_value("20"), json!(20));
        assert_eq!(parse_value("7.5"), json!(7.5));
        assert_eq!(parse_value("TRUE"), json!(true));
        assert_eq!(parse_value("Null"), Value::Null);
        assert_eq!(parse_value("Euler a"), json!("Euler a"));
        assert_eq!(parse_value(r#"["a","b"]"#), json!(["a", "b"]));
        assert_eq!(parse_value("inf"), json!("inf"));
        assert_eq!(parse_value("NaN"), json!("NaN"));
        assert_eq!(parse_value("-infinity"), json!("-infinity"));
    }

    #[test]
    fn test_parse_set_pairs_errors() {
        assert!(parse_set_pairs(&["steps".to_string()]).is_err());
        assert!(parse_set_pairs(&["a..b=1".to_string()]).is_err());
        let pairs = parse_set_pairs(&["seed=-1".to_string(), "x=a=b".to_string()]).unwrap();
        assert_eq!(pairs[0], (vec!["seed".to_string()], json!(-1)));
        assert_eq!(pairs[1], (vec!["x".to_string()], json!("a=b")));
    }

    #[test]
    fn test_apply_nested_paths() {
        let mut root = Map::new();
        apply_set_pairs(
            &mut root,
            &[
                "steps=25".to_string(),
                "override_settings.CLIP_stop_at_last_layers=2".to_string(),
                "override_settings.eta_noise_seed_delta=31337".to_string(),
            ],
        )
        .unwrap();
        assert_eq!(
            Value::Object(root),
            json!({
                "steps": 25,
                "override_settings": {"CLIP_stop_at_last_layers": 2, "eta_noise_seed_delta": 31337}
            })
        );
    }

    #[test]
    fn test_apply_through_scalar_fails() {
        let mut root = json!({"steps": 20}).as_object().cloned().unwrap();
        assert!(apply_set_pairs(&mut root, &["steps.inner=1".to_string()]).is_err());
    }
}
