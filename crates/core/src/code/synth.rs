use std::collections::HashMap;
use std::fmt;

use regex::{Captures, Regex};
use tracing::debug;

use crate::error::ConfigError;
use crate::finding::{CodeExamplePair, CodeSide, OptimizationKind};
use crate::patterns::compile;

type Rewrite = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;
type Template = Box<dyn Fn(&Identifiers) -> (String, String) + Send + Sync>;

const RECONSTRUCTED_NOTE: &str = "// Original version (reconstructed)";
const SUGGESTED_NOTE: &str = "// Optimized version (suggested)";

/// Words that look like identifiers in prose but never name user code.
const RESERVED: &[&str] = &[
    "function", "external", "public", "internal", "private", "view", "pure", "payable",
    "memory", "calldata", "storage", "constant", "immutable", "require", "revert", "error",
    "unchecked", "uint", "uint8", "uint16", "uint32", "uint64", "uint128", "uint256", "int",
    "int256", "address", "bool", "bytes", "bytes32", "string", "mapping", "return", "returns",
    "for", "while", "if", "else", "emit", "event", "modifier", "contract", "msg", "length",
    "true", "false", "this", "sender", "value",
];

/// Names mentioned in a finding's description, used to parameterize templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identifiers {
    pub function: Option<String>,
    pub variable: Option<String>,
}

impl Identifiers {
    /// Pick up `` `name()` `` / `function name` as the function and the first other
    /// backticked identifier as the variable.
    pub fn from_description(text: &str) -> Self {
        let mut ids = Self::default();
        for span in text.split('`').skip(1).step_by(2) {
            let span = span.trim();
            if let Some(name) = span.split_once('(').map(|(name, _)| name.trim()) {
                if span.ends_with(')') && ids.function.is_none() && is_user_identifier(name) {
                    ids.function = Some(name.to_string());
                }
            } else if ids.variable.is_none() && is_user_identifier(span) {
                ids.variable = Some(span.to_string());
            }
        }
        if ids.function.is_none() {
            let words: Vec<&str> = text.split_whitespace().collect();
            ids.function = words
                .windows(2)
                .filter(|pair| pair[0].eq_ignore_ascii_case("function"))
                .map(|pair| {
                    pair[1]
                        .trim_matches(|c: char| !c.is_alphanumeric() && c != '_')
                        .split('(')
                        .next()
                        .unwrap_or_default()
                })
                .find(|name| is_user_identifier(name))
                .map(str::to_string);
        }
        ids
    }

    fn function_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.function.as_deref().unwrap_or(default)
    }

    fn variable_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.variable.as_deref().unwrap_or(default)
    }
}

fn is_user_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid && word.len() >= 2 && !RESERVED.contains(&word.to_ascii_lowercase().as_str())
}

/// Forward (before -> after) and inverse (after -> before) rewrites for one
/// optimization type, plus a template pair used when neither side exists or a
/// rewrite does not apply. Rewrites return `None` when they change nothing.
pub struct TransformRule {
    forward: Rewrite,
    inverse: Rewrite,
    template: Template,
}

impl TransformRule {
    pub fn new<F, I, T>(forward: F, inverse: I, template: T) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
        I: Fn(&str) -> Option<String> + Send + Sync + 'static,
        T: Fn(&Identifiers) -> (String, String) + Send + Sync + 'static,
    {
        Self {
            forward: Box::new(forward),
            inverse: Box::new(inverse),
            template: Box::new(template),
        }
    }

    pub fn forward(&self, before: &str) -> Option<String> {
        (self.forward)(before)
    }

    pub fn inverse(&self, after: &str) -> Option<String> {
        (self.inverse)(after)
    }

    /// `(before, after)` illustration.
    pub fn template(&self, ids: &Identifiers) -> (String, String) {
        (self.template)(ids)
    }
}

impl fmt::Debug for TransformRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRule").finish_non_exhaustive()
    }
}

/// Rule table keyed by optimization type. Types without a rule use the generic one.
#[derive(Debug)]
pub struct SynthesisRules {
    rules: HashMap<OptimizationKind, TransformRule>,
    generic: TransformRule,
}

impl SynthesisRules {
    pub fn new(generic: TransformRule) -> Self {
        Self {
            rules: HashMap::new(),
            generic,
        }
    }

    /// Register or replace the rule for `kind`.
    pub fn insert(&mut self, kind: OptimizationKind, rule: TransformRule) {
        if kind == OptimizationKind::Generic {
            self.generic = rule;
        } else {
            self.rules.insert(kind, rule);
        }
    }

    pub fn rule(&self, kind: OptimizationKind) -> &TransformRule {
        self.rules.get(&kind).unwrap_or(&self.generic)
    }

    pub fn has_rule(&self, kind: OptimizationKind) -> bool {
        kind == OptimizationKind::Generic || self.rules.contains_key(&kind)
    }

    /// The built-in rules for every catalogue type.
    pub fn builtin() -> Result<Self, ConfigError> {
        let visibility = Visibility::compile()?;
        let loops = Loops::compile()?;

        let mut rules = Self::new(generic_rule(visibility.clone(), loops.clone()));
        rules.insert(OptimizationKind::VisibilityChange, visibility_rule(visibility));
        rules.insert(OptimizationKind::LoopOptimization, loop_rule(loops));
        rules.insert(OptimizationKind::CustomError, custom_error_rule()?);
        rules.insert(OptimizationKind::ConstantImmutable, constant_rule()?);
        rules.insert(OptimizationKind::UncheckedBlock, unchecked_rule()?);
        rules.insert(OptimizationKind::StoragePacking, storage_rule()?);
        Ok(rules)
    }
}

/// Fills the missing sides of a code pair and flags them as synthesized.
#[derive(Debug, Clone, Copy)]
pub struct CodeSynthesizer<'a> {
    rules: &'a SynthesisRules,
}

impl<'a> CodeSynthesizer<'a> {
    pub fn new(rules: &'a SynthesisRules) -> Self {
        Self { rules }
    }

    pub fn complete(
        &self,
        kind: OptimizationKind,
        mut pair: CodeExamplePair,
        description: &str,
    ) -> CodeExamplePair {
        let rule = self.rules.rule(kind);
        let template = || rule.template(&Identifiers::from_description(description));

        match (pair.before.clone(), pair.after.clone()) {
            (Some(_), Some(_)) => {}
            (None, Some(after)) => {
                let before = rule.inverse(&after).unwrap_or_else(|| template().0);
                pair.set_synthesized(CodeSide::Before, annotate(RECONSTRUCTED_NOTE, &before));
                debug!(%kind, side = "before", "synthesized code side");
            }
            (Some(before), None) => {
                let after = rule.forward(&before).unwrap_or_else(|| template().1);
                pair.set_synthesized(CodeSide::After, annotate(SUGGESTED_NOTE, &after));
                debug!(%kind, side = "after", "synthesized code side");
            }
            (None, None) => {
                let (before, after) = template();
                pair.set_synthesized(CodeSide::Before, annotate(RECONSTRUCTED_NOTE, &before));
                pair.set_synthesized(CodeSide::After, annotate(SUGGESTED_NOTE, &after));
                debug!(%kind, "synthesized both code sides");
            }
        }
        pair
    }
}

fn annotate(note: &str, code: &str) -> String {
    format!("{}\n{}", note, code.trim())
}

fn changed(original: &str, rewritten: String) -> Option<String> {
    (rewritten.trim() != original.trim()).then(|| rewritten.trim().to_string())
}

#[derive(Debug, Clone)]
struct Visibility {
    public_fn: Regex,
    external_fn: Regex,
}

impl Visibility {
    fn compile() -> Result<Self, ConfigError> {
        Ok(Self {
            public_fn: compile(
                r"(?m)^(?P<head>[ \t]*function\s+\w+\s*\([^)]*\)[^{;\n]*?)\bpublic\b",
            )?,
            external_fn: compile(
                r"(?m)^(?P<head>[ \t]*function\s+\w+\s*\([^)]*\)[^{;\n]*?)\bexternal\b",
            )?,
        })
    }

    fn forward(&self, code: &str) -> Option<String> {
        changed(code, self.public_fn.replace_all(code, "${head}external").into_owned())
    }

    fn inverse(&self, code: &str) -> Option<String> {
        changed(code, self.external_fn.replace_all(code, "${head}public").into_owned())
    }
}

fn visibility_rule(visibility: Visibility) -> TransformRule {
    let inverse = visibility.clone();
    TransformRule::new(
        move |code| visibility.forward(code),
        move |code| inverse.inverse(code),
        |ids| {
            let f = ids.function_or("setValue");
            (
                format!("function {f}(uint256 amount) public {{\n    total += amount;\n}}"),
                format!("function {f}(uint256 amount) external {{\n    total += amount;\n}}"),
            )
        },
    )
}

#[derive(Debug, Clone)]
struct Loops {
    postfix: Regex,
    prefix: Regex,
    length_condition: Regex,
    cached_length: Regex,
}

impl Loops {
    fn compile() -> Result<Self, ConfigError> {
        Ok(Self {
            postfix: compile(r"\b(?P<v>[A-Za-z_]\w*)\+\+")?,
            prefix: compile(r"\+\+(?P<v>[A-Za-z_]\w*)\b")?,
            length_condition: compile(
                r"^(?P<indent>[ \t]*)for\s*\([^;]*;\s*\w+\s*<=?\s*(?P<arr>[A-Za-z_][\w.\[\]]*)\.length\b",
            )?,
            cached_length: compile(
                r"^[ \t]*uint\d*\s+(?P<name>[A-Za-z_]\w*)\s*=\s*(?P<arr>[A-Za-z_][\w.\[\]]*)\.length\s*;[ \t]*$",
            )?,
        })
    }

    /// Cache `arr.length` ahead of the loop and switch to prefix increments.
    fn forward(&self, code: &str) -> Option<String> {
        let mut lines = Vec::new();
        for line in code.lines() {
            match self.length_condition.captures(line) {
                Some(caps) => {
                    let arr = &caps["arr"];
                    lines.push(format!("{}uint256 len = {}.length;", &caps["indent"], arr));
                    lines.push(line.replacen(&format!("{arr}.length"), "len", 1));
                }
                None => lines.push(line.to_string()),
            }
        }
        let joined = lines.join("\n");
        changed(code, self.postfix.replace_all(&joined, "++${v}").into_owned())
    }

    /// Read the length inside the loop condition again and use postfix increments.
    fn inverse(&self, code: &str) -> Option<String> {
        let mut cached: Vec<(String, String)> = Vec::new();
        let mut lines = Vec::new();
        for line in code.lines() {
            if let Some(caps) = self.cached_length.captures(line) {
                cached.push((caps["name"].to_string(), caps["arr"].to_string()));
                continue;
            }
            let mut line = line.to_string();
            if line.trim_start().starts_with("for") {
                for (name, arr) in &cached {
                    line = replace_word(&line, name, &format!("{arr}.length"));
                }
            }
            lines.push(line);
        }
        let joined = lines.join("\n");
        changed(code, self.prefix.replace_all(&joined, "${v}++").into_owned())
    }
}

/// Replace whole-identifier occurrences of `word`.
fn replace_word(text: &str, word: &str, with: &str) -> String {
    let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '$';
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (pos, _) in text.match_indices(word) {
        let end = pos + word.len();
        let joined_before = text[..pos].chars().next_back().is_some_and(is_ident);
        let joined_after = text[end..].chars().next().is_some_and(is_ident);
        if joined_before || joined_after {
            continue;
        }
        out.push_str(&text[last..pos]);
        out.push_str(with);
        last = end;
    }
    out.push_str(&text[last..]);
    out
}

fn loop_rule(loops: Loops) -> TransformRule {
    let inverse = loops.clone();
    TransformRule::new(
        move |code| loops.forward(code),
        move |code| inverse.inverse(code),
        |ids| {
            let v = ids.variable_or("items");
            (
                format!(
                    "for (uint256 i = 0; i < {v}.length; i++) {{\n    total += {v}[i];\n}}"
                ),
                format!(
                    "uint256 len = {v}.length;\nfor (uint256 i = 0; i < len; ++i) {{\n    total += {v}[i];\n}}"
                ),
            )
        },
    )
}

fn generic_rule(visibility: Visibility, loops: Loops) -> TransformRule {
    let (visibility_inv, loops_inv) = (visibility.clone(), loops.clone());
    TransformRule::new(
        move |code| compose(code, &[&|c: &str| visibility.forward(c), &|c: &str| loops.forward(c)]),
        move |code| {
            compose(code, &[&|c: &str| visibility_inv.inverse(c), &|c: &str| loops_inv.inverse(c)])
        },
        |ids| {
            let f = ids.function_or("process");
            let v = ids.variable_or("values");
            (
                format!(
                    "function {f}(uint256[] memory {v}) public {{\n    for (uint256 i = 0; i < {v}.length; i++) {{\n        total += {v}[i];\n    }}\n}}"
                ),
                format!(
                    "function {f}(uint256[] calldata {v}) external {{\n    uint256 len = {v}.length;\n    for (uint256 i = 0; i < len; ++i) {{\n        total += {v}[i];\n    }}\n}}"
                ),
            )
        },
    )
}

/// Apply rewrites in sequence; `None` only when none of them changed anything.
fn compose(code: &str, steps: &[&dyn Fn(&str) -> Option<String>]) -> Option<String> {
    let mut current: Option<String> = None;
    for step in steps {
        let input = current.as_deref().unwrap_or(code);
        if let Some(next) = step(input) {
            current = Some(next);
        }
    }
    current
}

fn custom_error_rule() -> Result<TransformRule, ConfigError> {
    let require = compile(
        r#"require\s*\(\s*(?P<cond>[^;]+?)\s*,\s*"(?P<msg>[^"]*)"\s*\)\s*;"#,
    )?;
    let guarded_block = compile(
        r"if\s*\((?P<cond>[^;{]+?)\)\s*\{\s*revert\s+(?P<name>[A-Z]\w*)\s*\([^;]*?\)\s*;\s*\}",
    )?;
    let guarded = compile(
        r"if\s*\((?P<cond>[^;{]+?)\)\s*revert\s+(?P<name>[A-Z]\w*)\s*\([^;]*?\)\s*;",
    )?;
    let bare = compile(r"\brevert\s+(?P<name>[A-Z]\w*)\s*\([^;]*?\)\s*;")?;
    let declaration = compile(r"(?m)^[ \t]*error\s+[A-Z]\w*\s*\([^)]*\)\s*;[ \t]*\n?")?;
    let comparison = compile(
        r"^(?P<l>[^=!<>&|]+?)\s*(?P<op>==|!=|>=|<=|>|<)\s*(?P<r>[^=!<>&|]+)$",
    )?;
    let negation = Negation { comparison };
    let negation_inv = negation.clone();

    let forward = move |code: &str| {
        let mut names: Vec<String> = Vec::new();
        let rewritten = require.replace_all(code, |caps: &Captures<'_>| {
            let name = error_name(&caps["msg"]);
            let statement = format!("if ({}) revert {}();", negation.negate(&caps["cond"]), name);
            if !names.contains(&name) {
                names.push(name);
            }
            statement
        });
        if names.is_empty() {
            return None;
        }
        let declarations: String = names
            .iter()
            .filter(|name| !rewritten.contains(&format!("error {name}(")))
            .map(|name| format!("error {name}();\n"))
            .collect();
        let out = if declarations.is_empty() {
            rewritten.into_owned()
        } else {
            format!("{}\n{}", declarations, rewritten)
        };
        changed(code, out)
    };

    let inverse = move |code: &str| {
        let as_require = |caps: &Captures<'_>| {
            format!(
                "require({}, \"{}\");",
                negation_inv.negate(&caps["cond"]),
                error_message(&caps["name"])
            )
        };
        let out = guarded_block.replace_all(code, as_require);
        let out = guarded.replace_all(&out, as_require);
        let out = bare.replace_all(&out, |caps: &Captures<'_>| {
            format!("revert(\"{}\");", error_message(&caps["name"]))
        });
        let out = declaration.replace_all(&out, "");
        changed(code, out.into_owned())
    };

    Ok(TransformRule::new(forward, inverse, |ids| {
        let f = ids.function_or("withdraw");
        (
            format!(
                "function {f}() external {{\n    require(msg.sender == owner, \"Unauthorized\");\n}}"
            ),
            format!(
                "error Unauthorized();\n\nfunction {f}() external {{\n    if (msg.sender != owner) revert Unauthorized();\n}}"
            ),
        )
    }))
}

#[derive(Debug, Clone)]
struct Negation {
    comparison: Regex,
}

impl Negation {
    fn negate(&self, cond: &str) -> String {
        let cond = cond.trim();
        if let Some(inner) = cond.strip_prefix("!(").and_then(|c| c.strip_suffix(')')) {
            if balanced(inner) {
                return inner.trim().to_string();
            }
        }
        if let Some(inner) = cond.strip_prefix('!') {
            if is_atom(inner) {
                return inner.to_string();
            }
        }
        if !cond.contains("&&") && !cond.contains("||") {
            if let Some(caps) = self.comparison.captures(cond) {
                let op = match &caps["op"] {
                    "==" => "!=",
                    "!=" => "==",
                    ">=" => "<",
                    "<=" => ">",
                    ">" => "<=",
                    _ => ">=",
                };
                return format!("{} {} {}", caps["l"].trim(), op, caps["r"].trim());
            }
        }
        if is_atom(cond) {
            format!("!{}", cond)
        } else {
            format!("!({})", cond)
        }
    }
}

fn balanced(text: &str) -> bool {
    let mut depth = 0i32;
    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return false;
        }
    }
    depth == 0
}

fn is_atom(text: &str) -> bool {
    !text.is_empty()
        && balanced(text)
        && text
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '[' | ']' | '(' | ')'))
}

/// `"Not owner"` -> `NotOwner`.
fn error_name(message: &str) -> String {
    let name: String = message
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .take(4)
        .map(|word| {
            let mut chars = word.chars();
            chars
                .next()
                .map(|first| first.to_uppercase().chain(chars).collect::<String>())
                .unwrap_or_default()
        })
        .collect();
    match name.chars().next() {
        None => "CustomError".to_string(),
        Some(c) if c.is_ascii_digit() => format!("E{}", name),
        Some(_) => name,
    }
}

/// `InsufficientBalance` -> `"Insufficient balance"`.
fn error_message(name: &str) -> String {
    let mut out = String::new();
    for (i, c) in name.chars().enumerate() {
        if i > 0 && c.is_uppercase() {
            out.push(' ');
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn constant_rule() -> Result<TransformRule, ConfigError> {
    let declaration = compile(
        r"^(?P<indent>[ \t]*)(?P<ty>(?:uint|int)\d*|address|bytes\d*|bool|string)(?P<mods>(?:[ \t]+(?:public|private|internal))?)[ \t]+(?P<name>[A-Za-z_]\w*)[ \t]*=[ \t]*(?P<value>[^;]+?)[ \t]*;(?P<rest>.*)$",
    )?;
    let literal = compile(
        r#"^(?:\d[\d_]*(?:\.\d+)?(?:e\d+)?(?:[ \t]*[*+][ \t]*\d[\d_]*)*(?:[ \t]+(?:wei|gwei|ether|seconds|minutes|hours|days|weeks))?|0x[0-9a-fA-F]+|"[^"]*"|true|false)$"#,
    )?;
    let modifier = compile(r"[ \t]+(?:constant|immutable)\b")?;

    let forward = move |code: &str| {
        let lines: Vec<String> = code
            .lines()
            .map(|line| match declaration.captures(line) {
                Some(caps) if literal.is_match(&caps["value"]) => format!(
                    "{}{}{} constant {} = {};{}",
                    &caps["indent"],
                    &caps["ty"],
                    &caps["mods"],
                    &caps["name"],
                    &caps["value"],
                    &caps["rest"]
                ),
                _ => line.to_string(),
            })
            .collect();
        changed(code, lines.join("\n"))
    };
    let inverse = move |code: &str| changed(code, modifier.replace_all(code, "").into_owned());

    Ok(TransformRule::new(forward, inverse, |ids| {
        let v = ids.variable_or("feeBasisPoints");
        (
            format!("uint256 public {v} = 250;"),
            format!("uint256 public constant {} = 250;", upper_snake(v)),
        )
    }))
}

/// `maxSupply` -> `MAX_SUPPLY`.
fn upper_snake(name: &str) -> String {
    let mut out = String::new();
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_uppercase() && prev_lower {
            out.push('_');
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        out.extend(c.to_uppercase());
    }
    out
}

fn unchecked_rule() -> Result<TransformRule, ConfigError> {
    let statement = compile(
        r"^(?P<indent>[ \t]*)(?P<stmt>(?:\+\+[A-Za-z_]\w*|[A-Za-z_]\w*\+\+|[A-Za-z_][\w.\[\]]*[ \t]*[+-]=[ \t]*[^;]+);)[ \t]*$",
    )?;
    let block = compile(r"unchecked\s*\{\s*(?P<body>[^{}]*?)\s*\}")?;

    let forward = move |code: &str| {
        let lines: Vec<String> = code
            .lines()
            .map(|line| match statement.captures(line) {
                Some(caps) => format!("{}unchecked {{ {} }}", &caps["indent"], &caps["stmt"]),
                None => line.to_string(),
            })
            .collect();
        changed(code, lines.join("\n"))
    };
    let inverse = move |code: &str| changed(code, block.replace_all(code, "${body}").into_owned());

    Ok(TransformRule::new(forward, inverse, |ids| {
        let f = ids.function_or("increment");
        let v = ids.variable_or("count");
        (
            format!("function {f}() external {{\n    {v} += 1;\n}}"),
            format!("function {f}() external {{\n    unchecked {{\n        {v} += 1;\n    }}\n}}"),
        )
    }))
}

fn storage_rule() -> Result<TransformRule, ConfigError> {
    let slot = compile(
        r"^[ \t]*(?P<ty>(?:uint|int)\d*|address(?:[ \t]+payable)?|bool|bytes\d*|string)\b[^=;(){}]*;[ \t]*$",
    )?;
    let slot_inv = slot.clone();

    Ok(TransformRule::new(
        move |code| reorder_runs(code, &slot, pack),
        move |code| reorder_runs(code, &slot_inv, spread),
        |ids| {
            let v = ids.variable_or("balance");
            (
                format!("uint128 {v};\nuint256 total;\nuint128 limit;"),
                format!("uint256 total;\nuint128 {v};\nuint128 limit;"),
            )
        },
    ))
}

/// Bytes a state variable of type `ty` occupies in its slot.
fn slot_size(ty: &str) -> usize {
    let ty = ty.split_whitespace().next().unwrap_or(ty);
    if ty == "address" {
        return 20;
    }
    if ty == "bool" {
        return 1;
    }
    if let Some(n) = ty.strip_prefix("bytes") {
        return n.parse().unwrap_or(32);
    }
    let bits = ty.trim_start_matches("uint").trim_start_matches("int");
    bits.parse::<usize>().map_or(32, |b| (b / 8).max(1))
}

/// Rewrite each run of consecutive declarations with `reorder`.
fn reorder_runs<'a>(
    code: &'a str,
    slot: &Regex,
    reorder: impl Fn(Vec<(usize, &'a str)>) -> Vec<&'a str>,
) -> Option<String> {
    let sized = |line: &str| slot.captures(line).map(|caps| slot_size(&caps["ty"]));
    let lines: Vec<&str> = code.lines().collect();
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        let mut run = Vec::new();
        while let Some(size) = lines.get(i).and_then(|line| sized(*line)) {
            run.push((size, lines[i]));
            i += 1;
        }
        if run.is_empty() {
            out.push(lines[i]);
            i += 1;
        } else {
            out.extend(reorder(run));
        }
    }
    changed(code, out.join("\n"))
}

/// Largest first so small types share trailing slots.
fn pack(mut run: Vec<(usize, &str)>) -> Vec<&str> {
    run.sort_by(|a, b| b.0.cmp(&a.0));
    run.into_iter().map(|(_, line)| line).collect()
}

/// Alternate small and full-slot types so no two small ones sit together.
fn spread(run: Vec<(usize, &str)>) -> Vec<&str> {
    let (full, small): (Vec<_>, Vec<_>) = run.into_iter().partition(|(size, _)| *size >= 32);
    let mut full = full.into_iter().map(|(_, line)| line);
    let mut out = Vec::new();
    for (_, line) in small {
        out.push(line);
        if let Some(next) = full.next() {
            out.push(next);
        }
    }
    out.extend(full);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> SynthesisRules {
        SynthesisRules::builtin().unwrap()
    }

    #[test]
    fn test_identifiers_from_description() {
        let ids = Identifiers::from_description(
            "The `withdraw()` function reads `balances` in a loop over `uint256` values.",
        );
        assert_eq!(ids.function.as_deref(), Some("withdraw"));
        assert_eq!(ids.variable.as_deref(), Some("balances"));

        let ids = Identifiers::from_description("In function claimRewards, the loop is slow.");
        assert_eq!(ids.function.as_deref(), Some("claimRewards"));
        assert!(ids.variable.is_none());
    }

    #[test]
    fn test_custom_error_inverse() {
        let rules = rules();
        let rule = rules.rule(OptimizationKind::CustomError);
        let after = "error InsufficientBalance();\n\nfunction withdraw(uint256 amount) external {\n    if (balance < amount) revert InsufficientBalance();\n}";
        let before = rule.inverse(after).unwrap();
        assert!(before.contains("require(balance >= amount, \"Insufficient balance\");"));
        assert!(!before.contains("error InsufficientBalance"));
        assert!(!before.contains("revert"));
    }

    #[test]
    fn test_custom_error_forward() {
        let rules = rules();
        let rule = rules.rule(OptimizationKind::CustomError);
        let before = "function mint() external {\n    require(msg.sender == owner, \"Not owner\");\n}";
        let after = rule.forward(before).unwrap();
        assert!(after.starts_with("error NotOwner();"));
        assert!(after.contains("if (msg.sender != owner) revert NotOwner();"));
    }

    #[test]
    fn test_negation_forms() {
        let negation = Negation {
            comparison: compile(
                r"^(?P<l>[^=!<>&|]+?)\s*(?P<op>==|!=|>=|<=|>|<)\s*(?P<r>[^=!<>&|]+)$",
            )
            .unwrap(),
        };
        assert_eq!(negation.negate("a > b"), "a <= b");
        assert_eq!(negation.negate("!paused"), "paused");
        assert_eq!(negation.negate("!(a && b)"), "a && b");
        assert_eq!(negation.negate("a && b"), "!(a && b)");
        assert_eq!(negation.negate("isActive"), "!isActive");
    }

    #[test]
    fn test_visibility_round_trip() {
        let rules = rules();
        let rule = rules.rule(OptimizationKind::VisibilityChange);
        let before = "function deposit(uint256 amount) public payable {\n    total += amount;\n}";
        let after = rule.forward(before).unwrap();
        assert!(after.starts_with("function deposit(uint256 amount) external payable"));
        assert_eq!(rule.inverse(&after).unwrap(), before);
        assert!(rule.forward(&after).is_none());
    }

    #[test]
    fn test_loop_transforms() {
        let rules = rules();
        let rule = rules.rule(OptimizationKind::LoopOptimization);
        let before = "for (uint256 i = 0; i < users.length; i++) {\n    total += users[i];\n}";
        let after = rule.forward(before).unwrap();
        assert_eq!(
            after,
            "uint256 len = users.length;\nfor (uint256 i = 0; i < len; ++i) {\n    total += users[i];\n}"
        );
        assert_eq!(rule.inverse(&after).unwrap(), before);
    }

    #[test]
    fn test_loop_inverse_only_replaces_whole_names() {
        let rules = rules();
        let rule = rules.rule(OptimizationKind::LoopOptimization);
        let after = "uint256 n = users.length;\nfor (uint256 i = 0; i < n && i < nMax; ++i) {\n    total += users[i];\n}";
        assert_eq!(
            rule.inverse(after).unwrap(),
            "for (uint256 i = 0; i < users.length && i < nMax; i++) {\n    total += users[i];\n}"
        );
        assert_eq!(replace_word("len + lenCap + _len + len", "len", "x"), "x + lenCap + _len + x");
    }

    #[test]
    fn test_constant_and_unchecked() {
        let rules = rules();
        let constant = rules.rule(OptimizationKind::ConstantImmutable);
        assert_eq!(
            constant.forward("uint256 public fee = 30;").unwrap(),
            "uint256 public constant fee = 30;"
        );
        assert!(constant.forward("uint256 public fee = computeFee();").is_none());
        assert_eq!(
            constant.inverse("address public immutable owner;").unwrap(),
            "address public owner;"
        );

        let unchecked = rules.rule(OptimizationKind::UncheckedBlock);
        assert_eq!(
            unchecked.forward("    count += 1;").unwrap(),
            "unchecked { count += 1; }"
        );
        assert_eq!(unchecked.inverse("unchecked { ++i; }").unwrap(), "++i;");
    }

    #[test]
    fn test_storage_packing() {
        let rules = rules();
        let rule = rules.rule(OptimizationKind::StoragePacking);
        let before = "uint128 a;\nuint256 b;\nuint128 c;";
        let after = rule.forward(before).unwrap();
        assert_eq!(after, "uint256 b;\nuint128 a;\nuint128 c;");
        assert_eq!(rule.inverse(&after).unwrap(), "uint128 a;\nuint256 b;\nuint128 c;");
        assert_eq!(slot_size("address payable"), 20);
        assert_eq!(slot_size("bytes4"), 4);
        assert_eq!(slot_size("uint"), 32);
    }

    #[test]
    fn test_complete_marks_synthesized_sides() {
        let rules = rules();
        let synthesizer = CodeSynthesizer::new(&rules);

        let mut pair = CodeExamplePair::default();
        pair.set_extracted(
            CodeSide::After,
            "if (amount == 0) revert ZeroAmount();".to_string(),
        );
        let pair = synthesizer.complete(OptimizationKind::CustomError, pair, "Use custom errors");
        assert!(pair.is_extracted(CodeSide::After));
        assert_eq!(pair.synthesized.len(), 1);
        assert!(pair.synthesized.contains(&CodeSide::Before));
        assert!(pair
            .before
            .as_deref()
            .unwrap()
            .contains("require(amount != 0, \"Zero amount\");"));

        let pair = synthesizer.complete(
            OptimizationKind::StoragePacking,
            CodeExamplePair::default(),
            "Pack `rewardRate` next to the other small fields.",
        );
        assert!(pair.is_fully_synthesized());
        assert!(pair.before.as_deref().unwrap().contains("uint128 rewardRate;"));
    }

    #[test]
    fn test_rule_not_applicable_falls_back_to_template() {
        let rules = rules();
        let synthesizer = CodeSynthesizer::new(&rules);
        let mut pair = CodeExamplePair::default();
        pair.set_extracted(CodeSide::Before, "// nothing to rewrite".to_string());
        let pair = synthesizer.complete(OptimizationKind::VisibilityChange, pair, "`claim()`");
        assert!(pair.after.as_deref().unwrap().contains("function claim(uint256 amount) external"));
        assert_eq!(pair.synthesized.len(), 1);
    }

    #[test]
    fn test_unknown_kind_uses_generic() {
        let mut rules = SynthesisRules::new(generic_rule(
            Visibility::compile().unwrap(),
            Loops::compile().unwrap(),
        ));
        assert!(!rules.has_rule(OptimizationKind::StoragePacking));
        let (before, _) = rules
            .rule(OptimizationKind::StoragePacking)
            .template(&Identifiers::default());
        assert!(before.contains("function process"));

        rules.insert(OptimizationKind::StoragePacking, storage_rule().unwrap());
        assert!(rules.has_rule(OptimizationKind::StoragePacking));
    }
}
