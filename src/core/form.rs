//! Input-form gating.
//!
//! A Dify app can declare variables the user must fill before chatting.
//! Until every required one has a value, no message may be sent.

use std::collections::HashMap;

use crate::api::{AppParameters, UserInputFormItem};

fn has_value(inputs: &HashMap<String, String>, item: &UserInputFormItem) -> bool {
    inputs
        .get(item.variable())
        .is_some_and(|v| !v.trim().is_empty())
}

/// True when the app has no form, or every required field has a value.
pub fn is_form_filled(parameters: Option<&AppParameters>, inputs: &HashMap<String, String>) -> bool {
    parameters.is_none_or(|p| {
        p.user_input_form
            .iter()
            .all(|item| !item.required() || has_value(inputs, item))
    })
}

/// Labels of required fields that are still empty, in form order.
pub fn unfilled_labels(
    parameters: Option<&AppParameters>,
    inputs: &HashMap<String, String>,
) -> Vec<String> {
    let Some(parameters) = parameters else {
        return Vec::new();
    };
    parameters
        .user_input_form
        .iter()
        .filter(|item| item.required() && !has_value(inputs, item))
        .map(|item| item.label().to_string())
        .collect()
}

/// Error shown when submission is blocked by the form.
pub fn missing_fields_message(labels: &[String]) -> String {
    format!("{} must not be empty", labels.join(", "))
}

/// Initial values for the form: each field's default, overridden by anything
/// already entered.
pub fn initial_values(
    parameters: Option<&AppParameters>,
    inputs: &HashMap<String, String>,
) -> Vec<(String, String)> {
    parameters
        .map(|p| {
            p.user_input_form
                .iter()
                .map(|item| {
                    let value = inputs
                        .get(item.variable())
                        .cloned()
                        .unwrap_or_else(|| item.field().default.clone());
                    (item.variable().to_string(), value)
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::FormField;

    fn text_field(label: &str, variable: &str, required: bool) -> UserInputFormItem {
        UserInputFormItem::TextInput(FormField {
            label: label.to_string(),
            variable: variable.to_string(),
            required,
            ..Default::default()
        })
    }

    fn params() -> AppParameters {
        AppParameters {
            user_input_form: vec![
                text_field("Name", "name", true),
                text_field("Nickname", "nick", false),
                text_field("Company", "company", true),
            ],
            ..Default::default()
        }
    }

    fn inputs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_no_parameters_or_empty_form_is_filled() {
        assert!(is_form_filled(None, &HashMap::new()));
        assert!(is_form_filled(Some(&AppParameters::default()), &HashMap::new()));
    }

    #[test]
    fn test_required_fields_must_be_non_empty() {
        let p = params();
        assert!(!is_form_filled(Some(&p), &inputs(&[("name", "Ada")])));
        assert!(!is_form_filled(Some(&p), &inputs(&[("name", "Ada"), ("company", "  ")])));
        assert!(is_form_filled(Some(&p), &inputs(&[("name", "Ada"), ("company", "ACME")])));
    }

    #[test]
    fn test_unfilled_labels_in_form_order() {
        let p = params();
        assert_eq!(unfilled_labels(Some(&p), &HashMap::new()), vec!["Name", "Company"]);
        assert_eq!(unfilled_labels(Some(&p), &inputs(&[("company", "x")])), vec!["Name"]);
    }

    #[test]
    fn test_missing_fields_message_lists_labels() {
        let msg = missing_fields_message(&["Name".to_string(), "Company".to_string()]);
        assert_eq!(msg, "Name, Company must not be empty");
    }

    #[test]
    fn test_initial_values_prefer_entered_values() {
        let mut p = params();
        if let UserInputFormItem::TextInput(f) = &mut p.user_input_form[1] {
            f.default = "anon".to_string();
        }
        let values = initial_values(Some(&p), &inputs(&[("name", "Ada")]));
        assert_eq!(values[0], ("name".to_string(), "Ada".to_string()));
        assert_eq!(values[1], ("nick".to_string(), "anon".to_string()));
        assert_eq!(values[2], ("company".to_string(), String::new()));
    }
}
