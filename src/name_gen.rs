//! Display names for variable records that had none in the class file.

use std::collections::HashMap;

use crate::descriptor;

/// Generates parameter and local names from type signatures. Local-name
/// counters reset per method so the numbering restarts for each body.
#[derive(Clone, Debug, Default)]
pub struct VariableNameGenerator {
    local_counters: HashMap<String, usize>,
    param_counters: HashMap<String, usize>,
}

impl VariableNameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget per-method numbering; called once per analyzed method.
    pub fn clear_local_names(&mut self) {
        self.local_counters.clear();
        self.param_counters.clear();
    }

    /// Name for a declared parameter, e.g. `paramInt`, `paramString1`.
    /// The numeric suffix is omitted when the signature appears only once
    /// in the parameter list.
    pub fn generate_parameter_name(
        &mut self,
        signature: &str,
        appears_once: bool,
        varargs: bool,
    ) -> String {
        let base = type_base_name(signature);
        let mut name = format!("param{}{}", capitalize(&base), if varargs { "s" } else { "" });
        if !appears_once {
            let counter = self.param_counters.entry(base).or_insert(0);
            *counter += 1;
            name.push_str(&counter.to_string());
        }
        name
    }

    /// Name for a synthesized local, e.g. `i`, `str`, `localObject2`.
    pub fn generate_local_name(&mut self, signature: &str, appears_once: bool) -> String {
        let base = type_base_name(signature);
        let name = local_base_name(&base, signature);
        if appears_once {
            return name;
        }
        let counter = self.local_counters.entry(name.clone()).or_insert(0);
        *counter += 1;
        format!("{}{}", name, counter)
    }
}

fn local_base_name(base: &str, signature: &str) -> String {
    match signature {
        "I" => "i".into(),
        "J" => "l".into(),
        "F" => "f".into(),
        "D" => "d".into(),
        "B" => "b".into(),
        "C" => "c".into(),
        "S" => "s".into(),
        "Z" => "bool".into(),
        _ => format!("local{}", capitalize(base)),
    }
}

fn type_base_name(signature: &str) -> String {
    match signature.as_bytes().first() {
        Some(b'I') => "Int".into(),
        Some(b'J') => "Long".into(),
        Some(b'F') => "Float".into(),
        Some(b'D') => "Double".into(),
        Some(b'B') => "Byte".into(),
        Some(b'C') => "Char".into(),
        Some(b'S') => "Short".into(),
        Some(b'Z') => "Boolean".into(),
        Some(b'[') => format!(
            "ArrayOf{}",
            type_base_name(descriptor::cut_array_dimension_prefix(signature))
        ),
        Some(b'L') => {
            let internal = signature.trim_start_matches('L').trim_end_matches(';');
            let simple = descriptor::simple_class_name(internal);
            // Inner-class simple names keep only the last component.
            match simple.rfind('$') {
                Some(pos) => simple[pos + 1..].to_string(),
                None => simple.to_string(),
            }
        }
        _ => "Object".into(),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_names() {
        let mut gen = VariableNameGenerator::new();
        assert_eq!(gen.generate_parameter_name("I", true, false), "paramInt");
        assert_eq!(gen.generate_parameter_name("I", false, false), "paramInt1");
        assert_eq!(gen.generate_parameter_name("I", false, false), "paramInt2");
        assert_eq!(
            gen.generate_parameter_name("[Ljava/lang/String;", true, true),
            "paramArrayOfStrings"
        );
    }

    #[test]
    fn test_local_names() {
        let mut gen = VariableNameGenerator::new();
        assert_eq!(gen.generate_local_name("I", true), "i");
        assert_eq!(gen.generate_local_name("Ljava/lang/String;", true), "localString");
        assert_eq!(gen.generate_local_name("Ljava/lang/Object;", false), "localObject1");
        assert_eq!(gen.generate_local_name("Ljava/lang/Object;", false), "localObject2");
        gen.clear_local_names();
        assert_eq!(gen.generate_local_name("Ljava/lang/Object;", false), "localObject1");
    }

    #[test]
    fn test_inner_class_base_name() {
        let mut gen = VariableNameGenerator::new();
        assert_eq!(
            gen.generate_local_name("Lcom/example/Outer$Inner;", true),
            "localInner"
        );
    }
}
