use chrono::{DateTime, Local};

use crate::forms::{ExpenseForm, IncomeForm};
use crate::ledger::Ledger;
use crate::models::{DateRange, EntryKind, ExpenseEntry, IncomeEntry};

/// Input mode for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    /// Typing into a modal form.
    Insert,
    /// Typing a search term on a list view.
    Search,
    /// Waiting for y/n on a delete.
    Confirm,
}

/// Active tab/page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveTab {
    #[default]
    Dashboard,
    Income,
    Expenses,
    Reports,
}

impl ActiveTab {
    pub fn next(&self) -> Self {
        match self {
            Self::Dashboard => Self::Income,
            Self::Income => Self::Expenses,
            Self::Expenses => Self::Reports,
            Self::Reports => Self::Dashboard,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            Self::Dashboard => Self::Reports,
            Self::Income => Self::Dashboard,
            Self::Expenses => Self::Income,
            Self::Reports => Self::Expenses,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Dashboard => "Dashboard",
            Self::Income => "Washes",
            Self::Expenses => "Expenses",
            Self::Reports => "Reports",
        }
    }

    pub fn all() -> Vec<Self> {
        vec![Self::Dashboard, Self::Income, Self::Expenses, Self::Reports]
    }

    /// The collection a list view edits, if any.
    pub fn kind(&self) -> Option<EntryKind> {
        match self {
            Self::Income => Some(EntryKind::Income),
            Self::Expenses => Some(EntryKind::Expense),
            _ => None,
        }
    }
}

/// Days shown on the dashboard chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartWindow {
    Week,
    #[default]
    Month,
}

impl ChartWindow {
    pub fn days(&self) -> u32 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
        }
    }

    pub fn toggle(&self) -> Self {
        match self {
            Self::Week => Self::Month,
            Self::Month => Self::Week,
        }
    }
}

/// What the last contact with the remote store looked like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No remote configured; everything stays on this device.
    #[default]
    LocalOnly,
    Online,
    Offline,
}

impl ConnectionStatus {
    pub fn label(&self) -> &str {
        match self {
            Self::LocalOnly => "LOCAL",
            Self::Online => "ONLINE",
            Self::Offline => "OFFLINE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelete {
    pub kind: EntryKind,
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    Income(IncomeForm),
    Expense(ExpenseForm),
    ConfirmDelete(PendingDelete),
}

/// Shared application state
#[derive(Debug, Default)]
pub struct State {
    pub income: Ledger<IncomeEntry>,
    pub expenses: Ledger<ExpenseEntry>,
    /// Current input mode
    pub input_mode: InputMode,
    /// Current active tab
    pub active_tab: ActiveTab,
    pub modal: Option<Modal>,
    pub income_search: String,
    pub expense_search: String,
    /// Row index within the filtered list of the current view
    pub selected_income: usize,
    pub selected_expense: usize,
    pub chart_window: ChartWindow,
    pub report_range: DateRange,
    pub connection: ConnectionStatus,
    pub last_refresh: Option<DateTime<Local>>,
    /// Status message to display
    pub status_message: Option<String>,
    /// Whether to show help overlay
    pub show_help: bool,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
    }

    pub fn clear_status(&mut self) {
        self.status_message = None;
    }

    pub fn open_modal(&mut self, modal: Modal) {
        self.input_mode = match modal {
            Modal::ConfirmDelete(_) => InputMode::Confirm,
            _ => InputMode::Insert,
        };
        self.modal = Some(modal);
    }

    pub fn close_modal(&mut self) {
        self.modal = None;
        self.input_mode = InputMode::Normal;
    }

    /// Washes visible on the income view, newest first.
    pub fn visible_income(&self) -> Vec<&IncomeEntry> {
        self.income.search(&self.income_search)
    }

    pub fn visible_expenses(&self) -> Vec<&ExpenseEntry> {
        self.expenses.search(&self.expense_search)
    }

    pub fn selected_income_entry(&self) -> Option<&IncomeEntry> {
        self.visible_income().get(self.selected_income).copied()
    }

    pub fn selected_expense_entry(&self) -> Option<&ExpenseEntry> {
        self.visible_expenses().get(self.selected_expense).copied()
    }

    /// Keep selections inside their lists after the lists change.
    pub fn clamp_selection(&mut self) {
        let income_len = self.visible_income().len();
        let expense_len = self.visible_expenses().len();
        self.selected_income = self.selected_income.min(income_len.saturating_sub(1));
        self.selected_expense = self.selected_expense.min(expense_len.saturating_sub(1));
    }
}
