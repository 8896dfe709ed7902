//! Cook formulas: variable validation and substitution.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::resolve::resolve;
use crate::types::{CookedMolecule, CookedRoot, CookedStep, Formula, FormulaError, Result};

/// Resolve and cook a formula by name.
pub fn cook(
    name: &str,
    vars: &HashMap<String, String>,
    search_path: &[PathBuf],
) -> Result<CookedMolecule> {
    let formula = resolve(name, search_path)?;
    cook_formula(&formula, vars)
}

/// Cook an already-resolved formula: validate required variables, apply
/// defaults, enforce enum/pattern constraints, and substitute `{{name}}`
/// placeholders. References to undeclared variables fail.
pub fn cook_formula(formula: &Formula, provided: &HashMap<String, String>) -> Result<CookedMolecule> {
    // 1. Required variables must be provided by the caller.
    for (name, def) in &formula.vars {
        if def.required && !provided.contains_key(name) {
            return Err(FormulaError::MissingVar(name.clone()));
        }
    }

    // 2. Defaults, overridden by provided values.
    let mut values: HashMap<String, String> = HashMap::new();
    for (name, def) in &formula.vars {
        if let Some(ref default) = def.default {
            values.insert(name.clone(), default.clone());
        }
    }
    for (k, v) in provided {
        values.insert(k.clone(), v.clone());
    }

    // 3. Enum membership and pattern constraints.
    for (name, def) in &formula.vars {
        let Some(value) = values.get(name) else {
            continue;
        };
        if !def.choices.is_empty() && !def.choices.contains(value) {
            return Err(FormulaError::InvalidVar {
                name: name.clone(),
                reason: format!("{value:?} is not one of {:?}", def.choices),
            });
        }
        if let Some(ref pattern) = def.pattern {
            let re = regex::Regex::new(pattern).map_err(|e| FormulaError::InvalidVar {
                name: name.clone(),
                reason: format!("invalid pattern: {e}"),
            })?;
            if !re.is_match(value) {
                return Err(FormulaError::InvalidVar {
                    name: name.clone(),
                    reason: format!("{value:?} does not match pattern {pattern:?}"),
                });
            }
        }
    }

    // 4. Substitute into the root and every step; check step references.
    let step_ids: Vec<&str> = formula.steps.iter().map(|s| s.id.as_str()).collect();

    let mut steps = Vec::with_capacity(formula.steps.len());
    for step in &formula.steps {
        for target in &step.depends_on {
            if !step_ids.contains(&target.as_str()) {
                return Err(FormulaError::UnknownStep {
                    step: step.id.clone(),
                    target: target.clone(),
                });
            }
        }
        steps.push(CookedStep {
            step_id: step.id.clone(),
            title: substitute(&step.title, &values)?,
            description: substitute(&step.description, &values)?,
            issue_type: step.step_type.clone(),
            depends_on: step.depends_on.clone(),
        });
    }

    Ok(CookedMolecule {
        root: CookedRoot {
            title: substitute(&formula.formula, &values)?,
            description: substitute(&formula.description, &values)?,
            issue_type: "epic".to_string(),
        },
        steps,
        source: formula.source.clone(),
    })
}

/// Substitute `{{name}}` placeholders. A reference to a variable with no
/// value is an [`FormulaError::UnknownVar`].
///
/// The scan is byte-wise (the delimiters and variable names are ASCII) but
/// copies whole slices, so surrounding text may be any UTF-8.
pub fn substitute(text: &str, values: &HashMap<String, String>) -> Result<String> {
    let mut result = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut copied = 0;
    let mut i = 0;
    while i < len {
        if i + 4 <= len && bytes[i] == b'{' && bytes[i + 1] == b'{' {
            let start = i + 2;
            if start < len && is_var_start(bytes[start]) {
                let mut end = start + 1;
                while end < len && is_var_cont(bytes[end]) {
                    end += 1;
                }
                if end + 1 < len && bytes[end] == b'}' && bytes[end + 1] == b'}' {
                    let name = &text[start..end];
                    match values.get(name) {
                        Some(val) => {
                            result.push_str(&text[copied..i]);
                            result.push_str(val);
                        }
                        None => return Err(FormulaError::UnknownVar(name.to_string())),
                    }
                    i = end + 2;
                    copied = i;
                    continue;
                }
            }
        }
        i += 1;
    }
    result.push_str(&text[copied..]);
    Ok(result)
}

fn is_var_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_var_cont(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
