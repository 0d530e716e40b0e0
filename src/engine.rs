//! The calculation engine: variable and function tables, statement loading,
//! dependency tracking and incremental recalculation.

use std::cell::{Cell, RefCell};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::Expr;
use crate::error::{CalcError, CalcResult};
use crate::functions::{self, BuiltinFn, FunctionDef, FunctionTable};
use crate::graph::DependencyGraph;
use crate::host;
use crate::locale::LocaleConfig;
use crate::parser;
use crate::value::Value;

/// Names with engine-defined meaning; statements cannot assign them.
pub const THIS: &str = "this";
pub const ROOT: &str = "root";
pub const CHANGED: &str = "_changed";

const ANON_PREFIX: &str = "__av__";
const MAX_CALL_DEPTH: usize = 64;

/// One registered statement: a parsed expression plus how its result is
/// stored after evaluation.
#[derive(Debug, Clone)]
pub struct Calculation {
    pub expr: Expr,
    pub is_variable: bool,
    /// Auto-named statements evaluate for their side effects; the result is
    /// not written anywhere.
    pub is_anonymous: bool,
}

pub type ExternalResolver = Rc<dyn Fn(&str) -> Option<Value>>;

/// Variable-table key. Lookup ignores ASCII case; the stored name keeps the
/// spelling it was first written with.
#[derive(Debug, Clone)]
struct VarKey(String);

impl From<&str> for VarKey {
    fn from(name: &str) -> Self {
        VarKey(name.to_string())
    }
}

impl PartialEq for VarKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for VarKey {}

impl Hash for VarKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_uppercase());
        }
    }
}

pub struct Engine {
    locale: LocaleConfig,
    identifier_chars: String,
    optimize: bool,
    reinit_subcontext_variables: bool,
    return_changed_collection: bool,
    variables: Rc<RefCell<IndexMap<VarKey, Value>>>,
    functions: Rc<RefCell<FunctionTable>>,
    external_resolver: Option<ExternalResolver>,
    data_context: Option<Value>,
    calculations: IndexMap<String, Calculation>,
    graph: DependencyGraph,
    return_name: Option<String>,
    anon_counter: usize,
    call_depth: Rc<Cell<usize>>,
    rng: Cell<u64>,
}

impl Engine {
    pub fn new() -> Self {
        let mut table = FunctionTable::default();
        functions::register_defaults(&mut table);
        Engine {
            locale: LocaleConfig::en_us(),
            identifier_chars: String::new(),
            optimize: true,
            reinit_subcontext_variables: true,
            return_changed_collection: true,
            variables: Rc::new(RefCell::new(IndexMap::new())),
            functions: Rc::new(RefCell::new(table)),
            external_resolver: None,
            data_context: None,
            calculations: IndexMap::new(),
            graph: DependencyGraph::new(),
            return_name: None,
            anon_counter: 0,
            call_depth: Rc::new(Cell::new(0)),
            rng: Cell::new(0x9E37_79B9_7F4A_7C15),
        }
    }

    pub fn with_data_context(context: Value) -> Self {
        let mut engine = Engine::new();
        engine.set_data_context(context);
        engine
    }

    /// Derived engine for sub-context evaluation: shares the variable and
    /// function tables with this engine but carries its own statement
    /// registry, graph and data context.
    pub(crate) fn derive_subcontext(&self) -> Engine {
        Engine {
            locale: self.locale.clone(),
            identifier_chars: self.identifier_chars.clone(),
            optimize: self.optimize,
            reinit_subcontext_variables: self.reinit_subcontext_variables,
            return_changed_collection: self.return_changed_collection,
            variables: Rc::clone(&self.variables),
            functions: Rc::clone(&self.functions),
            external_resolver: self.external_resolver.clone(),
            data_context: None,
            calculations: IndexMap::new(),
            graph: DependencyGraph::new(),
            return_name: None,
            anon_counter: 0,
            call_depth: Rc::clone(&self.call_depth),
            rng: Cell::new(self.rng.get() | 1),
        }
    }

    // Configuration.

    pub fn locale(&self) -> &LocaleConfig {
        &self.locale
    }

    pub fn set_locale(&mut self, locale: LocaleConfig) {
        self.locale = locale;
    }

    pub fn identifier_chars(&self) -> &str {
        &self.identifier_chars
    }

    /// Extra characters accepted inside identifiers, beyond letters, digits
    /// and `_`.
    pub fn set_identifier_chars(&mut self, chars: &str) {
        self.identifier_chars = chars.to_string();
    }

    pub fn set_optimize(&mut self, optimize: bool) {
        self.optimize = optimize;
    }

    /// When set (the default), a `*name` declaration whose variable already
    /// exists resets it to null instead of keeping the current value.
    /// Sub-context bodies that re-run against fresh collections want this.
    pub fn set_reinit_subcontext_variables(&mut self, reinit: bool) {
        self.reinit_subcontext_variables = reinit;
    }

    pub fn reinit_subcontext_variables(&self) -> bool {
        self.reinit_subcontext_variables
    }

    /// When set (the default), sub-context evaluation without an explicit
    /// return statement returns the list of items the body actually changed.
    pub fn set_return_changed_collection(&mut self, flag: bool) {
        self.return_changed_collection = flag;
    }

    pub fn return_changed_collection(&self) -> bool {
        self.return_changed_collection
    }

    pub fn set_external_resolver(&mut self, resolver: impl Fn(&str) -> Option<Value> + 'static) {
        self.external_resolver = Some(Rc::new(resolver));
    }

    pub(crate) fn resolve_external(&self, name: &str) -> Option<Value> {
        self.external_resolver.as_ref().and_then(|r| r(name))
    }

    // Data context.

    pub fn set_data_context(&mut self, context: Value) {
        {
            let mut vars = self.variables.borrow_mut();
            vars.insert(VarKey::from(THIS), context.clone());
            // The outermost context stays addressable from nested scopes.
            vars.entry(VarKey::from(ROOT))
                .or_insert_with(|| context.clone());
        }
        self.data_context = Some(context);
    }

    pub fn data_context(&self) -> Option<Value> {
        self.data_context.clone()
    }

    // Variables.

    // Variable names resolve ASCII-case-insensitively; the first spelling a
    // variable is written with is the one `variable_names` reports.

    pub fn get_variable(&self, name: &str) -> Option<Value> {
        self.variables.borrow().get(&VarKey::from(name)).cloned()
    }

    pub fn set_variable(&self, name: &str, value: Value) {
        self.variables
            .borrow_mut()
            .insert(VarKey::from(name), value);
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.borrow().contains_key(&VarKey::from(name))
    }

    pub fn remove_variable(&self, name: &str) -> Option<Value> {
        self.variables.borrow_mut().shift_remove(&VarKey::from(name))
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.variables.borrow().keys().map(|k| k.0.clone()).collect()
    }

    // Functions.

    pub fn lookup_function(&self, name: &str) -> Option<Rc<FunctionDef>> {
        self.functions
            .borrow()
            .get(&name.to_ascii_uppercase())
            .cloned()
    }

    pub fn register_function(
        &self,
        name: &str,
        min_args: usize,
        max_args: usize,
        implementation: BuiltinFn,
    ) {
        let def = FunctionDef::builtin(
            name,
            min_args,
            max_args,
            functions::Volatility::NonVolatile,
            implementation,
        );
        self.functions
            .borrow_mut()
            .insert(name.to_ascii_uppercase(), def);
    }

    pub(crate) fn register_def(&self, def: Rc<FunctionDef>) {
        self.functions
            .borrow_mut()
            .insert(def.name.to_ascii_uppercase(), def);
    }

    // Parsing and evaluation.

    /// Parses an expression against the current tables and, unless folding is
    /// disabled, collapses literal-only subtrees.
    pub fn parse(&self, text: &str) -> CalcResult<Expr> {
        let expr = parser::parse(self, text)?;
        Ok(if self.optimize {
            expr.optimize(self)
        } else {
            expr
        })
    }

    pub fn evaluate(&self, text: &str) -> CalcResult<Value> {
        self.parse(text)?.evaluate(self)
    }

    // Statement loading.

    /// Loads a batch of `;`-separated statements.
    ///
    /// Loading stops at the first failing statement and returns its error
    /// wrapped with the statement name; statements loaded before the failure
    /// stay registered.
    pub fn load_calculations(&mut self, text: &str) -> CalcResult<()> {
        self.load_batch(text, false)
    }

    /// Registers statements without the initial evaluation pass. Sub-context
    /// bodies load this way; evaluating at load time would count the first
    /// item twice for accumulator statements.
    pub(crate) fn load_deferred(&mut self, text: &str) -> CalcResult<()> {
        self.load_batch(text, true)
    }

    fn load_batch(&mut self, text: &str, defer: bool) -> CalcResult<()> {
        let statements = split_statements(text, self.locale.list_separator);
        let mut registered_variables: Vec<(String, String)> = Vec::new();
        for statement in statements {
            let (name, is_variable, is_return, expr_text) = match split_assignment(&statement) {
                Some((lhs, rhs)) => {
                    let (name, is_variable, is_return) = parse_lvalue(&lhs)?;
                    (name, is_variable, is_return, rhs)
                }
                None => {
                    self.anon_counter += 1;
                    let name = format!("{ANON_PREFIX}{}", self.anon_counter);
                    (name, false, false, statement.clone())
                }
            };
            self.add_statement(&name, is_variable, is_return, &expr_text, defer)
                .map_err(|e| e.in_statement(&name, &statement))?;
            if !defer && is_variable && self.calculations.contains_key(&name) {
                registered_variables.push((name, statement));
            }
        }
        // Registered variable statements take their initial value now that
        // the whole batch is in place.
        for (name, statement) in registered_variables {
            let value = match self.calculations.get(&name) {
                Some(calc) => calc
                    .expr
                    .evaluate(self)
                    .map_err(|e| e.in_statement(&name, &statement))?,
                None => continue,
            };
            self.set_variable(&name, value);
        }
        Ok(())
    }

    /// Registers a single named calculation against the data context.
    pub fn add_calculation(&mut self, name: &str, text: &str) -> CalcResult<()> {
        self.add_statement(name, false, false, text, false)
    }

    fn add_statement(
        &mut self,
        name: &str,
        is_variable: bool,
        is_return: bool,
        text: &str,
        defer: bool,
    ) -> CalcResult<()> {
        if name.eq_ignore_ascii_case(THIS)
            || name.eq_ignore_ascii_case(ROOT)
            || name.eq_ignore_ascii_case(CHANGED)
        {
            return Err(CalcError::eval(format!("'{name}' is a reserved name")));
        }
        if is_return {
            self.return_name = Some(name.to_string());
        }
        if is_variable {
            if !self.has_variable(name) {
                self.set_variable(name, Value::Null);
            } else if self.reinit_subcontext_variables {
                self.set_variable(name, Value::Null);
            }
        }

        let expr = self.parse(text)?;

        // Deferred bodies must stay inert until their predicate passes, so
        // the load-time shortcuts below are skipped for them.
        if is_variable && !defer {
            if let Expr::Literal(value) = &expr {
                self.set_variable(name, value.clone());
                return Ok(());
            }
            // A variable fed only by plain variables is a load-time constant;
            // there is nothing for the graph to track.
            if self.folds_to_constant(name, &expr) {
                let value = expr.evaluate(self)?;
                self.set_variable(name, value);
                return Ok(());
            }
        }

        self.graph.add_target(name);
        for binding in expr.bindings() {
            self.graph.add_target(&binding);
            self.graph.add_dependency(&binding, name)?;
        }

        let is_anonymous = name.starts_with(ANON_PREFIX);
        self.calculations.insert(
            name.to_string(),
            Calculation {
                expr,
                is_variable,
                is_anonymous,
            },
        );
        // Auto-named statements exist for their side effects (function
        // registration, validation throws); run them as soon as they load.
        // Deferred loads run them per item instead.
        if is_anonymous && !defer {
            if let Some(calc) = self.calculations.get(name) {
                calc.expr.evaluate(self)?;
            }
        }
        Ok(())
    }

    fn folds_to_constant(&self, name: &str, expr: &Expr) -> bool {
        if !expr.bindings().is_empty() || expr_is_volatile(expr) {
            return false;
        }
        expr.variables().iter().all(|v| {
            !v.eq_ignore_ascii_case(name)
                && self.has_variable(v)
                && !self.calculations.contains_key(v)
        })
    }

    pub fn remove_calculation(&mut self, name: &str) -> bool {
        self.graph.remove(name);
        self.calculations.shift_remove(name).is_some()
    }

    pub fn clear_calculations(&mut self) {
        self.calculations.clear();
        self.graph.clear();
        self.return_name = None;
    }

    pub(crate) fn calculations(&self) -> &IndexMap<String, Calculation> {
        &self.calculations
    }

    pub fn calculation_names(&self) -> Vec<String> {
        self.calculations.keys().cloned().collect()
    }

    pub fn has_calculation(&self, name: &str) -> bool {
        self.calculations.contains_key(name)
    }

    pub fn return_property_name(&self) -> Option<&str> {
        self.return_name.as_deref()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    // Reads and writes by name.

    /// Reads a variable, or failing that a data-context property path.
    pub fn get_value(&self, name: &str) -> CalcResult<Value> {
        if let Some(value) = self.get_variable(name) {
            return Ok(value);
        }
        match &self.data_context {
            Some(context) => host::get_path(context, name),
            None => Err(CalcError::UnknownIdentifier(name.to_string())),
        }
    }

    /// Writes a variable if one exists under `name`, otherwise a
    /// data-context property path.
    pub fn set_value(&self, name: &str, value: Value) -> CalcResult<()> {
        if self.has_variable(name) {
            self.set_variable(name, value);
            return Ok(());
        }
        match &self.data_context {
            Some(context) => host::set_path(context, name, value),
            None => Err(CalcError::UnknownIdentifier(name.to_string())),
        }
    }

    // Propagation.

    /// Re-evaluates the calculations that depend on `name`.
    ///
    /// Non-recursive notification rewrites direct dependents unconditionally.
    /// Recursive notification walks the transitive dependents but stops along
    /// any branch whose recomputed value is unchanged, and never re-enters
    /// the originally notified name.
    pub fn notify(&self, name: &str, recursive: bool) -> CalcResult<()> {
        if recursive {
            self.notify_recursive(name, name)
        } else {
            for dependent in self.graph.direct_dependents(name) {
                if let Some(calc) = self.calculations.get(&dependent) {
                    let value = calc.expr.evaluate(self)?;
                    self.store_result(&dependent, calc, value)?;
                }
            }
            Ok(())
        }
    }

    fn notify_recursive(&self, changed: &str, original: &str) -> CalcResult<()> {
        for dependent in self.graph.direct_dependents(changed) {
            if dependent == original {
                continue;
            }
            let Some(calc) = self.calculations.get(&dependent) else {
                continue;
            };
            let new = calc.expr.evaluate(self)?;
            let current = self.get_value(&dependent).unwrap_or(Value::Null);
            if !new.is_same(&current) {
                self.store_result(&dependent, calc, new)?;
                self.notify_recursive(&dependent, original)?;
            }
        }
        Ok(())
    }

    /// Convenience: write a value and propagate recursively.
    pub fn update(&self, name: &str, value: Value) -> CalcResult<()> {
        self.set_value(name, value)?;
        self.notify(name, true)
    }

    /// Re-evaluates every registered calculation in load order, writing a
    /// result back only when it differs from the current value.
    pub fn recalculate_all(&self) -> CalcResult<()> {
        for (name, calc) in &self.calculations {
            let value = calc.expr.evaluate(self)?;
            if calc.is_anonymous {
                continue;
            }
            let current = self.get_value(name).unwrap_or(Value::Null);
            if !value.is_same(&current) {
                self.store_result(name, calc, value)?;
            }
        }
        Ok(())
    }

    /// Writes a calculation result back unconditionally. Anonymous
    /// statements evaluate for effect only and store nothing.
    pub(crate) fn store_result(
        &self,
        name: &str,
        calc: &Calculation,
        value: Value,
    ) -> CalcResult<()> {
        if calc.is_anonymous {
            return Ok(());
        }
        if calc.is_variable {
            self.set_variable(name, value);
            Ok(())
        } else {
            self.set_value(name, value)
        }
    }

    // Call-depth guard shared across derived engines.

    pub(crate) fn enter_call(&self) -> CalcResult<()> {
        let depth = self.call_depth.get() + 1;
        if depth > MAX_CALL_DEPTH {
            return Err(CalcError::eval("expression recursion too deep"));
        }
        self.call_depth.set(depth);
        Ok(())
    }

    pub(crate) fn exit_call(&self) {
        let depth = self.call_depth.get();
        self.call_depth.set(depth.saturating_sub(1));
    }

    // Deterministic per-engine RNG stream (xorshift64*), so repeated runs of
    // the same statement batch are reproducible.

    pub fn seed_random(&self, seed: u64) {
        self.rng.set(seed.max(1));
    }

    pub(crate) fn next_random(&self) -> f64 {
        let mut x = self.rng.get();
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.rng.set(x);
        let bits = x.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 11;
        bits as f64 / (1u64 << 53) as f64
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

fn expr_is_volatile(expr: &Expr) -> bool {
    match expr {
        Expr::Function(def, args) => {
            !def.is_foldable() || args.iter().any(expr_is_volatile)
        }
        Expr::Unary(_, operand) => expr_is_volatile(operand),
        Expr::Binary(_, lhs, rhs) => expr_is_volatile(lhs) || expr_is_volatile(rhs),
        _ => false,
    }
}

// Statement text handling.

fn strip_comments(text: &str) -> String {
    let mut out = String::new();
    let mut in_block = false;
    for line in text.lines() {
        let mut trimmed = line.trim();
        if in_block {
            match trimmed.find("*/") {
                Some(idx) => {
                    in_block = false;
                    trimmed = trimmed[idx + 2..].trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                }
                None => continue,
            }
        }
        if trimmed.is_empty()
            || trimmed.starts_with("//")
            || trimmed.starts_with("#region")
            || trimmed.starts_with("#endregion")
        {
            continue;
        }
        if let Some(idx) = trimmed.find("/*") {
            let before = trimmed[..idx].trim_end();
            match trimmed[idx + 2..].find("*/") {
                Some(end) => {
                    let after = trimmed[idx + 2 + end + 2..].trim_start();
                    let mut merged = String::from(before);
                    if !before.is_empty() && !after.is_empty() {
                        merged.push(' ');
                    }
                    merged.push_str(after);
                    if !merged.is_empty() {
                        out.push_str(&merged);
                        out.push('\n');
                    }
                }
                None => {
                    in_block = true;
                    if !before.is_empty() {
                        out.push_str(before);
                        out.push('\n');
                    }
                }
            }
            continue;
        }
        out.push_str(trimmed);
        out.push('\n');
    }
    out
}

/// Splits statement text into statements. `;` at brace depth zero always
/// terminates; a line break also terminates, unless the line ends in `&`
/// (explicit continuation), ends in the list separator, or a brace group or
/// string literal is still open.
fn split_statements(text: &str, list_separator: char) -> Vec<String> {
    let clean = strip_comments(text);
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for line in clean.lines() {
        for c in line.trim_end().chars() {
            match quote {
                Some(q) => {
                    current.push(c);
                    if c == q {
                        quote = None;
                    }
                }
                None => match c {
                    '"' | '\'' => {
                        quote = Some(c);
                        current.push(c);
                    }
                    '{' => {
                        depth += 1;
                        current.push(c);
                    }
                    '}' => {
                        depth = depth.saturating_sub(1);
                        current.push(c);
                    }
                    ';' if depth == 0 => push_statement(&mut current, &mut statements),
                    _ => current.push(c),
                },
            }
        }
        // Decide whether the statement runs on past the line break.
        if quote.is_some() || depth > 0 {
            current.push(' ');
            continue;
        }
        let kept = current.trim_end().len();
        current.truncate(kept);
        if current.ends_with('&') {
            current.truncate(current.len() - 1);
            continue;
        }
        if current.ends_with(list_separator) {
            current.push(' ');
            continue;
        }
        push_statement(&mut current, &mut statements);
    }
    push_statement(&mut current, &mut statements);
    statements
}

fn push_statement(current: &mut String, statements: &mut Vec<String>) {
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    current.clear();
}

/// Splits `lvalue = expression` on the first `=`, provided it appears before
/// any grouping or comparison character. Statements without such an `=` are
/// anonymous.
fn split_assignment(statement: &str) -> Option<(String, String)> {
    for (idx, c) in statement.char_indices() {
        match c {
            '(' | '{' | '"' | '\'' | '<' | '>' | '!' => return None,
            '=' => {
                let lhs = statement[..idx].trim().to_string();
                let rhs = statement[idx + 1..].trim().to_string();
                if lhs.is_empty() || rhs.is_empty() {
                    return None;
                }
                return Some((lhs, rhs));
            }
            _ => {}
        }
    }
    None
}

/// Interprets lvalue markers: `*` declares a variable slot, `@` marks the
/// batch's return name. Markers may combine in either order (`@*total`).
fn parse_lvalue(lhs: &str) -> CalcResult<(String, bool, bool)> {
    let mut is_variable = false;
    let mut is_return = false;
    let mut name = lhs;
    loop {
        if let Some(rest) = name.strip_prefix('@') {
            is_return = true;
            name = rest.trim_start();
        } else if let Some(rest) = name.strip_prefix('*') {
            is_variable = true;
            name = rest.trim_start();
        } else {
            break;
        }
    }
    if name.is_empty() {
        return Err(CalcError::eval(format!("invalid assignment target '{lhs}'")));
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap_or(' ');
    let valid_first = unicode_ident::is_xid_start(first) || first == '_';
    let valid_rest = chars.all(|c| unicode_ident::is_xid_continue(c) || c == '_' || c == '.');
    if !valid_first || !valid_rest {
        return Err(CalcError::eval(format!("invalid assignment target '{lhs}'")));
    }
    Ok((name.to_string(), is_variable, is_return))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_split_on_semicolons_outside_braces() {
        let stmts = split_statements("a = 1;\nb = EXECUTEEXPR(x, {p = 1; q = 2});\nc = 3;", ',');
        assert_eq!(stmts.len(), 3);
        assert!(stmts[1].contains("q = 2"));
    }

    #[test]
    fn line_breaks_terminate_statements() {
        let stmts = split_statements("a = 1\nb = a + 1", ',');
        assert_eq!(stmts, vec!["a = 1".to_string(), "b = a + 1".to_string()]);
    }

    #[test]
    fn trailing_list_separator_continues_the_line() {
        let stmts = split_statements("x = SUM(1,\n2)", ',');
        assert_eq!(stmts, vec!["x = SUM(1, 2)".to_string()]);
    }

    #[test]
    fn open_brace_group_spans_lines() {
        let stmts = split_statements("b = EXECUTEEXPR(x, {\np = 1;\nq = 2\n})", ',');
        assert_eq!(stmts.len(), 1);
        assert!(stmts[0].contains("q = 2"));
    }

    #[test]
    fn comments_and_regions_are_stripped() {
        let text = "// header\n#region setup\na = 1;\n/* block\nstill block */\nb = 2;\n#endregion\n";
        let stmts = split_statements(text, ',');
        assert_eq!(stmts, vec!["a = 1".to_string(), "b = 2".to_string()]);
    }

    #[test]
    fn ampersand_joins_lines() {
        let stmts = split_statements("total = 1 + &\n 2;", ',');
        assert_eq!(stmts, vec!["total = 1 +  2".to_string()]);
    }

    #[test]
    fn variable_lookup_ignores_case() {
        let engine = Engine::new();
        engine.set_variable("Total", Value::Number(1.0));
        assert!(engine.has_variable("TOTAL"));
        assert_eq!(engine.get_variable("total"), Some(Value::Number(1.0)));
        engine.set_variable("tOtAl", Value::Number(2.0));
        assert_eq!(engine.variable_names(), vec!["Total".to_string()]);
        assert_eq!(engine.get_variable("Total"), Some(Value::Number(2.0)));
    }

    #[test]
    fn anonymous_statements_have_no_assignment() {
        assert!(split_assignment("THROWEX('bad')").is_none());
        assert!(split_assignment("a >= 1").is_none());
        let (lhs, rhs) = split_assignment("x = y = 1").unwrap();
        assert_eq!(lhs, "x");
        assert_eq!(rhs, "y = 1");
    }

    #[test]
    fn lvalue_markers() {
        assert_eq!(parse_lvalue("*x").unwrap(), ("x".to_string(), true, false));
        assert_eq!(
            parse_lvalue("@*_total").unwrap(),
            ("_total".to_string(), true, true)
        );
        assert_eq!(
            parse_lvalue("Order.Total").unwrap(),
            ("Order.Total".to_string(), false, false)
        );
        assert!(parse_lvalue("*").is_err());
        assert!(parse_lvalue("9lives").is_err());
    }
}
