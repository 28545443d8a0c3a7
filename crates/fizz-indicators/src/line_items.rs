//! Synonym table from filed account labels to canonical line items.
//!
//! Filings name the same account differently across companies, years and
//! consolidation scopes. A [`LineItemTable`] is a list of [`LineItemRule`]s,
//! each mapping one exact (statement, category, subcategory) label to a
//! [`LineItem`]. Lookups never do fuzzy matching.

use std::collections::HashMap;
use std::path::Path;

use fizz_core::{BalanceEntry, FizzError, LineItem, Result, StatementType};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One synonym: an exact filed label and the item it stands for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemRule {
    /// Statement the label is filed on.
    pub statement: StatementType,
    /// Category (statement group) the label must be filed under; `None` matches any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Account label.
    pub subcategory: String,
    /// Canonical item.
    pub item: LineItem,
}

impl LineItemRule {
    /// Creates a rule that matches the label under any category.
    #[must_use]
    pub fn new(statement: StatementType, subcategory: impl Into<String>, item: LineItem) -> Self {
        Self {
            statement,
            category: None,
            subcategory: subcategory.into(),
            item,
        }
    }

    /// Restricts the rule to one category.
    #[must_use]
    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// A match of an entry against the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineItemMatch {
    /// Canonical item.
    pub item: LineItem,
    /// Position of the matching rule; lower wins when two labels tie on period.
    pub priority: usize,
}

type ExactKey = (StatementType, String, String);
type AnyCategoryKey = (StatementType, String);

/// Exact-match lookup from filed labels to canonical line items.
///
/// A rule pinned to a category takes precedence over a rule for the same
/// label that matches any category.
#[derive(Clone, Debug)]
pub struct LineItemTable {
    rules: Vec<LineItemRule>,
    exact: HashMap<ExactKey, LineItemMatch>,
    any_category: HashMap<AnyCategoryKey, LineItemMatch>,
}

impl LineItemTable {
    fn empty() -> Self {
        Self {
            rules: Vec::new(),
            exact: HashMap::new(),
            any_category: HashMap::new(),
        }
    }

    /// Builds a table from rules, in priority order.
    ///
    /// Repeating a rule is allowed; mapping one label to two items is not.
    ///
    /// # Errors
    /// Returns [`FizzError::Config`] on conflicting rules or a rule whose item
    /// is not filed on the rule's statement.
    pub fn from_rules(rules: Vec<LineItemRule>) -> Result<Self> {
        let mut table = Self::empty();
        for rule in rules {
            table.push(rule)?;
        }
        Ok(table)
    }

    /// Appends a rule with the lowest priority so far.
    ///
    /// # Errors
    /// Returns [`FizzError::Config`] if the rule conflicts with the table.
    pub fn push(&mut self, rule: LineItemRule) -> Result<()> {
        if !rule.item.statements().contains(&rule.statement) {
            return Err(FizzError::Config(format!(
                "{} is not filed on statement {} (label {:?})",
                rule.item, rule.statement, rule.subcategory
            )));
        }

        let existing = match &rule.category {
            Some(category) => self
                .exact
                .get(&(rule.statement, category.clone(), rule.subcategory.clone())),
            None => self
                .any_category
                .get(&(rule.statement, rule.subcategory.clone())),
        };
        if let Some(existing) = existing {
            if existing.item == rule.item {
                return Ok(());
            }
            return Err(FizzError::Config(format!(
                "Label {:?} on {} maps to both {} and {}",
                rule.subcategory, rule.statement, existing.item, rule.item
            )));
        }

        let found = LineItemMatch {
            item: rule.item,
            priority: self.rules.len(),
        };
        match &rule.category {
            Some(category) => {
                self.exact.insert(
                    (rule.statement, category.clone(), rule.subcategory.clone()),
                    found,
                );
            }
            None => {
                self.any_category
                    .insert((rule.statement, rule.subcategory.clone()), found);
            }
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Parses a JSON array of rules.
    ///
    /// # Errors
    /// Returns [`FizzError::Parse`] on malformed JSON and [`FizzError::Config`]
    /// on conflicting rules.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let rules: Vec<LineItemRule> =
            serde_json::from_str(json).map_err(|e| FizzError::Parse(e.to_string()))?;
        Self::from_rules(rules)
    }

    /// Reads a JSON array of rules from a file.
    ///
    /// # Errors
    /// Returns [`FizzError::Config`] if the file cannot be read, otherwise as
    /// [`Self::from_json_str`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| FizzError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Rules in priority order.
    #[must_use]
    pub fn rules(&self) -> &[LineItemRule] {
        &self.rules
    }

    /// Looks up a filed label.
    #[must_use]
    pub fn lookup(
        &self,
        statement: StatementType,
        category: &str,
        subcategory: &str,
    ) -> Option<LineItemMatch> {
        self.exact
            .get(&(statement, category.to_string(), subcategory.to_string()))
            .or_else(|| {
                self.any_category
                    .get(&(statement, subcategory.to_string()))
            })
            .copied()
    }

    /// Looks up the label of an entry.
    #[must_use]
    pub fn classify(&self, entry: &BalanceEntry) -> Option<LineItemMatch> {
        self.lookup(entry.statement, &entry.category, &entry.subcategory)
    }
}

impl Default for LineItemTable {
    fn default() -> Self {
        let mut table = Self::empty();
        for rule in default_rules() {
            if let Err(e) = table.push(rule) {
                warn!(error = %e, "Skipping built-in line item rule");
            }
        }
        table
    }
}

/// The built-in rules: CVM DFP/ITR account names, consolidated scope first,
/// followed by common English labels.
///
/// CVM's "Passivo Total" includes equity, so it is deliberately absent;
/// total liabilities then come from current plus non-current liabilities.
#[must_use]
pub fn default_rules() -> Vec<LineItemRule> {
    use LineItem::*;
    use StatementType::*;

    let labels: &[(StatementType, &str, LineItem)] = &[
        (BalanceSheetAssets, "Ativo Total", TotalAssets),
        (BalanceSheetAssets, "Total Assets", TotalAssets),
        (BalanceSheetLiabilities, "Passivo Exigível", TotalLiabilities),
        (BalanceSheetLiabilities, "Exigível Total", TotalLiabilities),
        (BalanceSheetLiabilities, "Total Liabilities", TotalLiabilities),
        (BalanceSheetLiabilities, "Passivo Circulante", CurrentLiabilities),
        (BalanceSheetLiabilities, "Current Liabilities", CurrentLiabilities),
        (BalanceSheetLiabilities, "Passivo Não Circulante", NoncurrentLiabilities),
        (BalanceSheetLiabilities, "Passivo Nao Circulante", NoncurrentLiabilities),
        (BalanceSheetLiabilities, "Non-current Liabilities", NoncurrentLiabilities),
        (BalanceSheetLiabilities, "Noncurrent Liabilities", NoncurrentLiabilities),
        (BalanceSheetLiabilities, "Patrimônio Líquido Consolidado", TotalEquity),
        (BalanceSheetLiabilities, "Patrimônio Líquido", TotalEquity),
        (BalanceSheetLiabilities, "Patrimonio Liquido", TotalEquity),
        (BalanceSheetLiabilities, "Total Equity", TotalEquity),
        (BalanceSheetLiabilities, "Shareholders' Equity", TotalEquity),
        (IncomeStatement, "Lucro/Prejuízo Consolidado do Período", NetIncome),
        (IncomeStatement, "Lucro/Prejuízo do Período", NetIncome),
        (IncomeStatement, "Lucro Líquido do Período", NetIncome),
        (IncomeStatement, "Lucro ou Prejuízo Líquido Consolidado do Período", NetIncome),
        (IncomeStatement, "Net Income", NetIncome),
        (IncomeStatement, "Net Income (Loss)", NetIncome),
    ];
    let cash_flow: &[(&str, LineItem)] = &[
        ("Caixa Líquido Atividades Operacionais", OperatingCashFlow),
        ("Caixa Líquido das Atividades Operacionais", OperatingCashFlow),
        ("Net Cash from Operating Activities", OperatingCashFlow),
        ("Caixa Líquido Atividades de Investimento", InvestingCashFlow),
        ("Caixa Líquido das Atividades de Investimento", InvestingCashFlow),
        ("Net Cash from Investing Activities", InvestingCashFlow),
        ("Caixa Líquido Atividades de Financiamento", FinancingCashFlow),
        ("Caixa Líquido das Atividades de Financiamento", FinancingCashFlow),
        ("Net Cash from Financing Activities", FinancingCashFlow),
    ];

    let mut rules: Vec<LineItemRule> = labels
        .iter()
        .map(|(statement, label, item)| LineItemRule::new(*statement, *label, *item))
        .collect();
    for statement in [CashFlowIndirect, CashFlowDirect] {
        rules.extend(
            cash_flow
                .iter()
                .map(|(label, item)| LineItemRule::new(statement, *label, *item)),
        );
    }
    rules
}
