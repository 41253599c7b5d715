use std::path::PathBuf;
use std::time::Duration;

use chrono::{Local, Utc};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::prelude::*;
use ratatui::symbols::Marker;
use ratatui::widgets::*;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::action::Action;
use crate::aggregate;
use crate::config::Config;
use crate::diff::ChangeSet;
use crate::error::Result;
use crate::export::{self, Report, format_brl};
use crate::forms::{ExpenseForm, FormField, IncomeForm, format_timestamp_input};
use crate::models::{EntryKind, ExpenseEntry, IncomeEntry, Record};
use crate::remote::RemoteStore;
use crate::scheduler::Scheduler;
use crate::state::{ActiveTab, ConnectionStatus, InputMode, Modal, PendingDelete, State};
use crate::storage::Storage;
use crate::tui::{self, Tui};

/// Main application struct
pub struct App<R> {
    storage: Storage<R>,
    state: State,
    export_dir: PathBuf,
    refresh_every: Duration,
    heartbeat_every: Duration,
    tx: UnboundedSender<Action>,
    rx: UnboundedReceiver<Action>,
    should_quit: bool,
}

impl<R: RemoteStore> App<R> {
    pub async fn new(storage: Storage<R>, config: &Config) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut app = Self {
            storage,
            state: State::new(),
            export_dir: config.export_dir.clone(),
            refresh_every: config.refresh_every(),
            heartbeat_every: config.heartbeat_every(),
            tx,
            rx,
            should_quit: false,
        };

        app.refresh().await;
        app.heartbeat().await;
        app
    }

    pub async fn run(&mut self) -> Result<()> {
        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic_info| {
            let _ = tui::restore();
            original_hook(panic_info);
        }));

        let mut terminal = tui::init()?;
        let mut scheduler =
            Scheduler::start(self.tx.clone(), self.refresh_every, self.heartbeat_every);
        let result = self.run_loop(&mut terminal).await;
        scheduler.stop();
        tui::restore()?;
        result
    }

    async fn run_loop(&mut self, terminal: &mut Tui) -> Result<()> {
        while !self.should_quit {
            self.draw(terminal)?;
            while let Ok(action) = self.rx.try_recv() {
                self.update(action).await;
            }
            if let Some(action) = self.handle_events()? {
                self.update(action).await;
            }
        }
        Ok(())
    }

    async fn refresh(&mut self) {
        let income = self.storage.fetch_all::<IncomeEntry>().await;
        let expenses = self.storage.fetch_all::<ExpenseEntry>().await;
        let income_changes = ChangeSet::between(self.state.income.entries(), &income);
        let expense_changes = ChangeSet::between(self.state.expenses.entries(), &expenses);
        if !income_changes.is_empty() || !expense_changes.is_empty() {
            tracing::info!(
                income_inserted = income_changes.inserted.len(),
                income_updated = income_changes.updated.len(),
                income_deleted = income_changes.deleted.len(),
                expenses_inserted = expense_changes.inserted.len(),
                expenses_updated = expense_changes.updated.len(),
                expenses_deleted = expense_changes.deleted.len(),
                "Refresh brought changes"
            );
        }

        self.state.income.replace_all(income);
        self.state.expenses.replace_all(expenses);
        self.state.clamp_selection();
        self.state.last_refresh = Some(Local::now());
    }

    async fn heartbeat(&mut self) {
        self.state.connection = if !self.storage.is_remote() {
            ConnectionStatus::LocalOnly
        } else if self.storage.ping().await {
            ConnectionStatus::Online
        } else {
            ConnectionStatus::Offline
        };
    }

    fn draw(&mut self, terminal: &mut Tui) -> Result<()> {
        terminal.draw(|frame| self.render(frame))?;
        Ok(())
    }

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ])
            .split(area);

        self.draw_header(frame, layout[0]);
        self.draw_content(frame, layout[1]);
        self.draw_footer(frame, layout[2]);

        if let Some(modal) = &self.state.modal {
            self.draw_modal(frame, area, modal);
        }
        if self.state.show_help {
            self.draw_help_overlay(frame, area);
        }
    }

    fn draw_header(&self, frame: &mut Frame, area: Rect) {
        let tabs: Vec<Line> = ActiveTab::all()
            .iter()
            .map(|t| {
                if *t == self.state.active_tab {
                    Line::from(format!(" {} ", t.title())).style(
                        Style::default()
                            .fg(Color::Yellow)
                            .add_modifier(Modifier::BOLD),
                    )
                } else {
                    Line::from(format!(" {} ", t.title()))
                }
            })
            .collect();

        let connection_color = match self.state.connection {
            ConnectionStatus::Online => Color::Green,
            ConnectionStatus::Offline => Color::Red,
            ConnectionStatus::LocalOnly => Color::Gray,
        };
        let title = Line::from(vec![
            Span::raw(" Car Wash Ledger "),
            Span::styled(
                format!("[{}] ", self.state.connection.label()),
                Style::default().fg(connection_color),
            ),
        ]);

        let tabs_widget = Tabs::new(tabs)
            .block(Block::default().borders(Borders::ALL).title(title))
            .select(self.state.active_tab as usize)
            .highlight_style(Style::default().fg(Color::Yellow));

        frame.render_widget(tabs_widget, area);
    }

    fn draw_content(&self, frame: &mut Frame, area: Rect) {
        match self.state.active_tab {
            ActiveTab::Dashboard => self.draw_dashboard(frame, area),
            ActiveTab::Income => self.draw_income(frame, area),
            ActiveTab::Expenses => self.draw_expenses(frame, area),
            ActiveTab::Reports => self.draw_reports(frame, area),
        }
    }

    fn draw_dashboard(&self, frame: &mut Frame, area: Rect) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(0)])
            .split(area);

        let summary = aggregate::summarize(
            self.state.income.entries(),
            self.state.expenses.entries(),
        );
        let profit_color = if summary.profit >= Decimal::ZERO {
            Color::Cyan
        } else {
            Color::Red
        };

        let cards = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
            ])
            .split(layout[0]);

        let card = |title: &'static str, amount: Decimal, color: Color| {
            Paragraph::new(vec![
                Line::from(""),
                Line::from(Span::styled(
                    format_brl(amount),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                )),
            ])
            .centered()
            .block(Block::default().borders(Borders::ALL).title(title))
        };

        frame.render_widget(
            card(" Gross Income ", summary.total_income, Color::Green),
            cards[0],
        );
        frame.render_widget(
            card(" Cash Out ", summary.total_expenses, Color::Red),
            cards[1],
        );
        frame.render_widget(
            card(" Net Profit ", summary.profit, profit_color),
            cards[2],
        );

        self.draw_daily_chart(frame, layout[1]);
    }

    fn draw_daily_chart(&self, frame: &mut Frame, area: Rect) {
        let days = self.state.chart_window.days();
        let series = aggregate::daily_series(
            self.state.income.entries(),
            self.state.expenses.entries(),
            days,
            Local::now().date_naive(),
        );

        let income_points: Vec<(f64, f64)> = series
            .iter()
            .enumerate()
            .map(|(i, d)| (i as f64, d.income.to_f64().unwrap_or_default()))
            .collect();
        let expense_points: Vec<(f64, f64)> = series
            .iter()
            .enumerate()
            .map(|(i, d)| (i as f64, d.expenses.to_f64().unwrap_or_default()))
            .collect();

        let max_y = income_points
            .iter()
            .chain(expense_points.iter())
            .map(|(_, y)| *y)
            .fold(0.0_f64, f64::max)
            .max(1.0)
            * 1.1;

        let day_label = |idx: usize| {
            series
                .get(idx)
                .map(|d| d.date.format("%d/%m").to_string())
                .unwrap_or_default()
        };
        let last = series.len().saturating_sub(1);

        let datasets = vec![
            Dataset::default()
                .name("Income")
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Blue))
                .data(&income_points),
            Dataset::default()
                .name("Expenses")
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Red))
                .data(&expense_points),
        ];

        let chart = Chart::new(datasets)
            .block(Block::default().borders(Borders::ALL).title(format!(
                " Daily Monitoring - last {days} days (</> to switch) "
            )))
            .x_axis(
                Axis::default()
                    .style(Style::default().fg(Color::Gray))
                    .bounds([0.0, last as f64])
                    .labels(vec![day_label(0), day_label(last / 2), day_label(last)]),
            )
            .y_axis(
                Axis::default()
                    .style(Style::default().fg(Color::Gray))
                    .bounds([0.0, max_y])
                    .labels(vec![
                        "0".to_string(),
                        format!("{:.0}", max_y / 2.0),
                        format!("{:.0}", max_y),
                    ]),
            );

        frame.render_widget(chart, area);
    }

    fn search_bar(&self, term: &str, placeholder: &str) -> Paragraph<'static> {
        let searching = self.state.input_mode == InputMode::Search;
        let (text, style) = if term.is_empty() && !searching {
            (placeholder.to_string(), Style::default().fg(Color::DarkGray))
        } else if searching {
            (format!("{term}_"), Style::default().fg(Color::Yellow))
        } else {
            (term.to_string(), Style::default())
        };
        Paragraph::new(text)
            .style(style)
            .block(Block::default().borders(Borders::ALL).title(" Search (/) "))
    }

    fn draw_income(&self, frame: &mut Frame, area: Rect) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(area);

        frame.render_widget(
            self.search_bar(&self.state.income_search, "Search by service type..."),
            layout[0],
        );

        let visible = self.state.visible_income();
        let rows: Vec<Row> = visible
            .iter()
            .map(|e| {
                Row::new(vec![
                    Cell::from(local_time(*e)),
                    Cell::from(e.service_type.clone()),
                    Cell::from(e.vehicle_size.to_string()),
                    Cell::from(e.payment_method.to_string()),
                    Cell::from(format_brl(e.amount)),
                ])
            })
            .collect();

        let title = if visible.is_empty() {
            " Washes - no records found ".to_string()
        } else {
            format!(" Washes ({}) - n: new  e: edit  d: delete ", visible.len())
        };
        let table = Table::new(
            rows,
            [
                Constraint::Length(17),
                Constraint::Min(20),
                Constraint::Length(8),
                Constraint::Length(8),
                Constraint::Length(16),
            ],
        )
        .header(
            Row::new(vec!["Date/Time", "Service", "Size", "Payment", "Amount"])
                .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().borders(Borders::ALL).title(title))
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");

        let mut table_state = TableState::default().with_selected(
            (!visible.is_empty()).then_some(self.state.selected_income),
        );
        frame.render_stateful_widget(table, layout[1], &mut table_state);
    }

    fn draw_expenses(&self, frame: &mut Frame, area: Rect) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(area);

        frame.render_widget(
            self.search_bar(&self.state.expense_search, "Search by note..."),
            layout[0],
        );

        let visible = self.state.visible_expenses();
        let rows: Vec<Row> = visible
            .iter()
            .map(|e| {
                Row::new(vec![
                    Cell::from(local_time(*e)),
                    Cell::from(note_or_placeholder(e)),
                    Cell::from(format_brl(e.amount)),
                ])
            })
            .collect();

        let title = if visible.is_empty() {
            " Expenses - no records found ".to_string()
        } else {
            format!(" Expenses ({}) - n: new  e: edit  d: delete ", visible.len())
        };
        let table = Table::new(
            rows,
            [
                Constraint::Length(17),
                Constraint::Min(20),
                Constraint::Length(16),
            ],
        )
        .header(
            Row::new(vec!["Date/Time", "Note", "Amount"])
                .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().borders(Borders::ALL).title(title))
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");

        let mut table_state = TableState::default().with_selected(
            (!visible.is_empty()).then_some(self.state.selected_expense),
        );
        frame.render_stateful_widget(table, layout[1], &mut table_state);
    }

    fn draw_reports(&self, frame: &mut Frame, area: Rect) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(7), // Summary stats
                Constraint::Min(0),    // Detail tables
            ])
            .split(area);

        let now = Local::now();
        let range = self.state.report_range;
        let income = aggregate::filter_range(self.state.income.entries(), range, now);
        let expenses = aggregate::filter_range(self.state.expenses.entries(), range, now);
        let report = aggregate::report_summary(&income, &expenses);

        // --- Summary Stats ---
        let stats_block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" Statement: < {} >  x: export  p: print ", range.title()));
        let inner = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(stats_block.inner(layout[0]));
        frame.render_widget(stats_block, layout[0]);

        let label = |text: &'static str| Span::styled(text, Style::default().fg(Color::Gray));
        let left_stats = vec![
            Line::from(vec![
                label("Washes:          "),
                Span::raw(report.income_count.to_string()),
            ]),
            Line::from(vec![
                label("Average ticket:  "),
                Span::raw(format_brl(report.average_ticket)),
            ]),
            Line::from(vec![
                label("Total income:    "),
                Span::styled(
                    format_brl(report.totals.total_income),
                    Style::default().fg(Color::Green),
                ),
            ]),
            Line::from(vec![
                label("Total expenses:  "),
                Span::styled(
                    format_brl(report.totals.total_expenses),
                    Style::default().fg(Color::Red),
                ),
            ]),
        ];
        frame.render_widget(Paragraph::new(left_stats), inner[0]);

        let (status, status_color) = if report.totals.profit >= Decimal::ZERO {
            ("Surplus", Color::Cyan)
        } else {
            ("Deficit", Color::Red)
        };
        let mut right_stats = vec![Line::from(vec![
            label("Operating result: "),
            Span::styled(
                format!("{} ({status})", format_brl(report.totals.profit)),
                Style::default().fg(status_color).add_modifier(Modifier::BOLD),
            ),
        ])];
        for totals in aggregate::payment_breakdown(&income) {
            right_stats.push(Line::from(vec![
                Span::styled(
                    format!("{:<18}", totals.method.to_string()),
                    Style::default().fg(Color::Gray),
                ),
                Span::raw(format!("{:>3} x  {}", totals.count, format_brl(totals.total))),
            ]));
        }
        frame.render_widget(Paragraph::new(right_stats), inner[1]);

        // --- Detail tables ---
        let tables = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(layout[1]);

        let mut income_sorted: Vec<&IncomeEntry> = income.iter().collect();
        income_sorted.sort_by_key(|e| std::cmp::Reverse(e.timestamp));
        let income_rows: Vec<Row> = income_sorted
            .iter()
            .map(|e| {
                Row::new(vec![
                    Cell::from(local_time(*e)),
                    Cell::from(format!("{} ({})", e.service_type, e.vehicle_size)),
                    Cell::from(e.payment_method.to_string()),
                    Cell::from(format_brl(e.amount)),
                ])
            })
            .collect();
        let income_table = Table::new(
            income_rows,
            [
                Constraint::Length(17),
                Constraint::Min(12),
                Constraint::Length(7),
                Constraint::Length(14),
            ],
        )
        .header(
            Row::new(vec!["Date/Time", "Service", "Payment", "Amount"])
                .style(Style::default().fg(Color::Cyan)),
        )
        .block(Block::default().borders(Borders::ALL).title(" Income Detail "));
        frame.render_widget(income_table, tables[0]);

        let mut expenses_sorted: Vec<&ExpenseEntry> = expenses.iter().collect();
        expenses_sorted.sort_by_key(|e| std::cmp::Reverse(e.timestamp));
        let expense_rows: Vec<Row> = expenses_sorted
            .iter()
            .map(|e| {
                Row::new(vec![
                    Cell::from(
                        e.timestamp
                            .with_timezone(&Local)
                            .format("%d/%m/%Y")
                            .to_string(),
                    ),
                    Cell::from(note_or_placeholder(e)),
                    Cell::from(format_brl(e.amount)),
                ])
            })
            .collect();
        let expense_table = Table::new(
            expense_rows,
            [Constraint::Length(10), Constraint::Min(10), Constraint::Length(14)],
        )
        .header(Row::new(vec!["Date", "Note", "Amount"]).style(Style::default().fg(Color::Cyan)))
        .block(Block::default().borders(Borders::ALL).title(" Expense Detail "));
        frame.render_widget(expense_table, tables[1]);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let mode_str = match self.state.input_mode {
            InputMode::Normal => "NORMAL",
            InputMode::Insert => "INSERT",
            InputMode::Search => "SEARCH",
            InputMode::Confirm => "CONFIRM",
        };

        let status = self
            .state
            .status_message
            .clone()
            .unwrap_or_else(|| "Ready".to_string());
        let synced = self
            .state
            .last_refresh
            .map(|t| format!("synced {}", t.format("%H:%M:%S")))
            .unwrap_or_else(|| "never synced".to_string());

        let footer_text = Line::from(vec![
            Span::styled(
                format!(" {} ", mode_str),
                Style::default()
                    .bg(Color::Blue)
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::styled(status, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(synced, Style::default().fg(Color::DarkGray)),
            Span::raw(" | "),
            Span::styled("? for Help", Style::default().fg(Color::DarkGray)),
        ]);

        let footer = Paragraph::new(footer_text).block(Block::default().borders(Borders::ALL));
        frame.render_widget(footer, area);
    }

    fn draw_modal(&self, frame: &mut Frame, area: Rect, modal: &Modal) {
        match modal {
            Modal::Income(form) => {
                let title = if form.editing_id.is_some() {
                    " Edit Wash "
                } else {
                    " New Wash "
                };
                let fields = vec![
                    form_line(
                        "Service type",
                        &form.service_type,
                        form.active == FormField::ServiceType,
                        true,
                    ),
                    form_line(
                        "Vehicle size",
                        &form.vehicle_size.to_string(),
                        form.active == FormField::VehicleSize,
                        false,
                    ),
                    form_line("Amount (R$)", &form.amount, form.active == FormField::Amount, true),
                    form_line(
                        "Payment",
                        &form.payment_method.to_string(),
                        form.active == FormField::PaymentMethod,
                        false,
                    ),
                    form_line(
                        "Date and time",
                        &form.timestamp,
                        form.active == FormField::Timestamp,
                        true,
                    ),
                ];
                draw_form(frame, area, title, fields);
            }
            Modal::Expense(form) => {
                let title = if form.editing_id.is_some() {
                    " Edit Expense "
                } else {
                    " New Expense "
                };
                let fields = vec![
                    form_line("Amount (R$)", &form.amount, form.active == FormField::Amount, true),
                    form_line("Note", &form.note, form.active == FormField::Note, true),
                    form_line(
                        "Date and time",
                        &form.timestamp,
                        form.active == FormField::Timestamp,
                        true,
                    ),
                ];
                draw_form(frame, area, title, fields);
            }
            Modal::ConfirmDelete(pending) => {
                let text = vec![
                    Line::from(""),
                    Line::from(format!(
                        "Delete this {}?",
                        pending.kind.to_string().to_lowercase()
                    )),
                    Line::from(Span::styled(
                        pending.label.clone(),
                        Style::default().add_modifier(Modifier::BOLD),
                    )),
                    Line::from(""),
                    Line::from(Span::styled(
                        "y: delete   n/Esc: keep",
                        Style::default().fg(Color::Yellow),
                    )),
                ];
                let popup_area = centered_rect(50, 30, area);
                frame.render_widget(Clear, popup_area);
                frame.render_widget(
                    Paragraph::new(text).centered().block(
                        Block::default()
                            .borders(Borders::ALL)
                            .title(" Confirm ")
                            .style(Style::default().fg(Color::Red)),
                    ),
                    popup_area,
                );
            }
        }
    }

    fn draw_help_overlay(&self, frame: &mut Frame, area: Rect) {
        let help_text = vec![
            Line::from("Navigation:"),
            Line::from("  Tab/Shift+Tab  Switch views"),
            Line::from("  Up/Down        Select rows"),
            Line::from("  Left/Right     Chart window / report period"),
            Line::from(""),
            Line::from("Records:"),
            Line::from("  n              New record"),
            Line::from("  e / Enter      Edit selected"),
            Line::from("  d              Delete selected"),
            Line::from("  /              Search"),
            Line::from(""),
            Line::from("Forms:"),
            Line::from("  Tab            Next field"),
            Line::from("  Left/Right     Change choice"),
            Line::from("  Enter          Save"),
            Line::from("  Esc            Cancel"),
            Line::from(""),
            Line::from("General:"),
            Line::from("  x / p          Export / print report"),
            Line::from("  r              Refresh now"),
            Line::from("  ?              Toggle help"),
            Line::from("  q              Quit application"),
        ];

        let help_block = Paragraph::new(help_text).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help ")
                .style(Style::default().bg(Color::DarkGray)),
        );

        let popup_area = centered_rect(50, 80, area);
        frame.render_widget(Clear, popup_area);
        frame.render_widget(help_block, popup_area);
    }

    fn handle_events(&mut self) -> Result<Option<Action>> {
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    return Ok(None);
                }
                return Ok(self.map_key(key));
            }
        }
        Ok(None)
    }

    fn map_key(&self, key: KeyEvent) -> Option<Action> {
        match self.state.input_mode {
            InputMode::Normal => self.map_normal_key(key),
            InputMode::Insert => map_insert_key(key),
            InputMode::Search => match key.code {
                KeyCode::Esc => Some(Action::CancelInput),
                KeyCode::Enter => Some(Action::EndSearch),
                KeyCode::Backspace => Some(Action::InputBackspace),
                KeyCode::Char(c) => Some(Action::InputChar(c)),
                _ => None,
            },
            InputMode::Confirm => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => Some(Action::ConfirmDelete),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Some(Action::CancelInput),
                _ => None,
            },
        }
    }

    fn map_normal_key(&self, key: KeyEvent) -> Option<Action> {
        let on_list = self.state.active_tab.kind().is_some();
        let on_reports = self.state.active_tab == ActiveTab::Reports;
        match key.code {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('?') => Some(Action::ToggleHelp),
            KeyCode::Esc if self.state.show_help => Some(Action::ToggleHelp),
            KeyCode::Tab => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    Some(Action::PrevTab)
                } else {
                    Some(Action::NextTab)
                }
            }
            KeyCode::BackTab => Some(Action::PrevTab),
            KeyCode::Char('r') => Some(Action::Refresh),
            KeyCode::Up | KeyCode::Char('k') => Some(Action::Up),
            KeyCode::Down | KeyCode::Char('j') => Some(Action::Down),
            KeyCode::Left | KeyCode::Char('h') => Some(Action::Left),
            KeyCode::Right | KeyCode::Char('l') => Some(Action::Right),
            KeyCode::Char('n') if on_list => Some(Action::OpenNewForm),
            KeyCode::Char('e') | KeyCode::Enter if on_list => Some(Action::OpenEditForm),
            KeyCode::Char('d') | KeyCode::Delete if on_list => Some(Action::RequestDelete),
            KeyCode::Char('/') if on_list => Some(Action::StartSearch),
            KeyCode::Char('x') if on_reports => Some(Action::ExportWorkbook),
            KeyCode::Char('p') if on_reports => Some(Action::PrintReport),
            _ => None,
        }
    }

    async fn update(&mut self, action: Action) {
        match action {
            Action::Quit => {
                self.should_quit = true;
            }
            Action::NextTab => {
                self.state.active_tab = self.state.active_tab.next();
                self.state.clear_status();
            }
            Action::PrevTab => {
                self.state.active_tab = self.state.active_tab.prev();
                self.state.clear_status();
            }
            Action::ToggleHelp => {
                self.state.show_help = !self.state.show_help;
            }
            Action::Up => match self.state.active_tab {
                ActiveTab::Income => {
                    self.state.selected_income = self.state.selected_income.saturating_sub(1)
                }
                ActiveTab::Expenses => {
                    self.state.selected_expense = self.state.selected_expense.saturating_sub(1)
                }
                _ => {}
            },
            Action::Down => {
                match self.state.active_tab {
                    ActiveTab::Income => self.state.selected_income += 1,
                    ActiveTab::Expenses => self.state.selected_expense += 1,
                    _ => {}
                }
                self.state.clamp_selection();
            }
            Action::Left | Action::Right => match self.state.modal.as_mut() {
                Some(Modal::Income(form)) => form.cycle_choice(action == Action::Right),
                Some(_) => {}
                None => match self.state.active_tab {
                    ActiveTab::Dashboard => {
                        self.state.chart_window = self.state.chart_window.toggle()
                    }
                    ActiveTab::Reports => {
                        self.state.report_range = if action == Action::Right {
                            self.state.report_range.next()
                        } else {
                            self.state.report_range.prev()
                        }
                    }
                    _ => {}
                },
            },
            Action::OpenNewForm => match self.state.active_tab {
                ActiveTab::Income => {
                    self.state.open_modal(Modal::Income(IncomeForm::new(Utc::now())))
                }
                ActiveTab::Expenses => {
                    self.state.open_modal(Modal::Expense(ExpenseForm::new(Utc::now())))
                }
                _ => {}
            },
            Action::OpenEditForm => {
                let modal = match self.state.active_tab {
                    ActiveTab::Income => self
                        .state
                        .selected_income_entry()
                        .map(|e| Modal::Income(IncomeForm::edit(e))),
                    ActiveTab::Expenses => self
                        .state
                        .selected_expense_entry()
                        .map(|e| Modal::Expense(ExpenseForm::edit(e))),
                    _ => None,
                };
                if let Some(modal) = modal {
                    self.state.open_modal(modal);
                }
            }
            Action::NextField | Action::PrevField => {
                let forward = action == Action::NextField;
                match self.state.modal.as_mut() {
                    Some(Modal::Income(form)) => form.focus_next(forward),
                    Some(Modal::Expense(form)) => form.focus_next(forward),
                    _ => {}
                }
            }
            Action::InputChar(c) => match self.state.input_mode {
                InputMode::Search => {
                    match self.state.active_tab {
                        ActiveTab::Income => {
                            self.state.income_search.push(c);
                            self.state.selected_income = 0;
                        }
                        ActiveTab::Expenses => {
                            self.state.expense_search.push(c);
                            self.state.selected_expense = 0;
                        }
                        _ => {}
                    }
                }
                _ => match self.state.modal.as_mut() {
                    Some(Modal::Income(form)) => form.push_char(c),
                    Some(Modal::Expense(form)) => form.push_char(c),
                    _ => {}
                },
            },
            Action::InputBackspace => match self.state.input_mode {
                InputMode::Search => {
                    match self.state.active_tab {
                        ActiveTab::Income => {
                            self.state.income_search.pop();
                        }
                        ActiveTab::Expenses => {
                            self.state.expense_search.pop();
                        }
                        _ => {}
                    }
                    self.state.clamp_selection();
                }
                _ => match self.state.modal.as_mut() {
                    Some(Modal::Income(form)) => form.pop_char(),
                    Some(Modal::Expense(form)) => form.pop_char(),
                    _ => {}
                },
            },
            Action::StartSearch => {
                self.state.input_mode = InputMode::Search;
            }
            Action::EndSearch => {
                self.state.input_mode = InputMode::Normal;
            }
            Action::CancelInput => {
                if self.state.input_mode == InputMode::Search {
                    match self.state.active_tab {
                        ActiveTab::Income => self.state.income_search.clear(),
                        ActiveTab::Expenses => self.state.expense_search.clear(),
                        _ => {}
                    }
                    self.state.clamp_selection();
                }
                self.state.close_modal();
            }
            Action::SubmitForm => self.submit_form().await,
            Action::RequestDelete => {
                let pending = match self.state.active_tab {
                    ActiveTab::Income => {
                        self.state
                            .selected_income_entry()
                            .map(|e| PendingDelete {
                                kind: EntryKind::Income,
                                id: e.id.clone(),
                                label: format!("{} - {}", e.service_type, format_brl(e.amount)),
                            })
                    }
                    ActiveTab::Expenses => {
                        self.state
                            .selected_expense_entry()
                            .map(|e| PendingDelete {
                                kind: EntryKind::Expense,
                                id: e.id.clone(),
                                label: format!(
                                    "{} - {}",
                                    note_or_placeholder(e),
                                    format_brl(e.amount)
                                ),
                            })
                    }
                    _ => None,
                };
                if let Some(pending) = pending {
                    self.state.open_modal(Modal::ConfirmDelete(pending));
                }
            }
            Action::ConfirmDelete => self.confirm_delete().await,
            Action::Refresh => {
                self.refresh().await;
            }
            Action::Heartbeat => {
                self.heartbeat().await;
            }
            Action::ExportWorkbook | Action::PrintReport => self.export(action),
        }
    }

    async fn submit_form(&mut self) {
        let Some(modal) = self.state.modal.clone() else {
            return;
        };

        let outcome = match modal {
            Modal::Income(form) => match form.build() {
                Ok(entry) => {
                    let message = format!(
                        "Saved {} wash of {}",
                        entry.service_type,
                        format_brl(entry.amount)
                    );
                    let changes = if form.editing_id.is_some() {
                        self.state.income.update(entry)
                    } else {
                        Ok(self.state.income.insert(entry))
                    };
                    match changes {
                        Ok(changes) => self.save::<IncomeEntry>(&changes).await.map(|_| message),
                        Err(e) => Err(e),
                    }
                }
                Err(e) => {
                    self.state.set_status(e.to_string());
                    return;
                }
            },
            Modal::Expense(form) => match form.build() {
                Ok(entry) => {
                    let message = format!("Saved expense of {}", format_brl(entry.amount));
                    let changes = if form.editing_id.is_some() {
                        self.state.expenses.update(entry)
                    } else {
                        Ok(self.state.expenses.insert(entry))
                    };
                    match changes {
                        Ok(changes) => self.save::<ExpenseEntry>(&changes).await.map(|_| message),
                        Err(e) => Err(e),
                    }
                }
                Err(e) => {
                    self.state.set_status(e.to_string());
                    return;
                }
            },
            Modal::ConfirmDelete(_) => return,
        };

        self.state.close_modal();
        self.state.clamp_selection();
        match outcome {
            Ok(message) => self.state.set_status(message),
            Err(e) => self.state.set_status(format!("Error: {e}")),
        }
    }

    async fn confirm_delete(&mut self) {
        let Some(Modal::ConfirmDelete(pending)) = self.state.modal.clone() else {
            return;
        };
        self.state.close_modal();

        let outcome = match pending.kind {
            EntryKind::Income => match self.state.income.remove(&pending.id) {
                Ok(changes) => self.save::<IncomeEntry>(&changes).await,
                Err(e) => Err(e),
            },
            EntryKind::Expense => match self.state.expenses.remove(&pending.id) {
                Ok(changes) => self.save::<ExpenseEntry>(&changes).await,
                Err(e) => Err(e),
            },
        };

        self.state.clamp_selection();
        match outcome {
            Ok(()) => self.state.set_status(format!("Deleted {}", pending.label)),
            Err(e) => self.state.set_status(format!("Error: {e}")),
        }
    }

    /// Mirror a ledger mutation to the stores.
    async fn save<E: Record>(&self, changes: &ChangeSet) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let result = match E::KIND {
            EntryKind::Income => {
                self.storage
                    .sync_changes(self.state.income.entries(), changes)
                    .await
            }
            EntryKind::Expense => {
                self.storage
                    .sync_changes(self.state.expenses.entries(), changes)
                    .await
            }
        };
        if let Err(e) = &result {
            tracing::error!(kind = %E::KIND, error = %e, "Could not write local snapshot");
        }
        result
    }

    fn export(&mut self, action: Action) {
        let now = Local::now();
        let range = self.state.report_range;
        let mut income = aggregate::filter_range(self.state.income.entries(), range, now);
        let mut expenses = aggregate::filter_range(self.state.expenses.entries(), range, now);
        income.sort_by_key(|e| std::cmp::Reverse(e.timestamp));
        expenses.sort_by_key(|e| std::cmp::Reverse(e.timestamp));

        let report = Report {
            range,
            generated_at: now,
            income: &income,
            expenses: &expenses,
        };
        let written = if action == Action::PrintReport {
            export::write_statement(&self.export_dir, &report)
        } else {
            export::export_workbook(&self.export_dir, &report)
        };

        match written {
            Ok(path) => self.state.set_status(format!("Report written to {}", path.display())),
            Err(e) => {
                tracing::error!(error = %e, "Export failed");
                self.state.set_status(format!("Export failed: {e}"));
            }
        }
    }
}

fn map_insert_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Esc => Some(Action::CancelInput),
        KeyCode::Enter => Some(Action::SubmitForm),
        KeyCode::Tab if key.modifiers.contains(KeyModifiers::SHIFT) => Some(Action::PrevField),
        KeyCode::Tab | KeyCode::Down => Some(Action::NextField),
        KeyCode::BackTab | KeyCode::Up => Some(Action::PrevField),
        KeyCode::Left => Some(Action::Left),
        KeyCode::Right => Some(Action::Right),
        KeyCode::Char(c) => Some(Action::InputChar(c)),
        KeyCode::Backspace => Some(Action::InputBackspace),
        _ => None,
    }
}

fn local_time<E: Record>(entry: &E) -> String {
    format_timestamp_input(entry.timestamp())
}

fn note_or_placeholder(entry: &ExpenseEntry) -> String {
    if entry.note.is_empty() {
        export::EMPTY_NOTE.to_string()
    } else {
        entry.note.clone()
    }
}

fn form_line(label: &str, value: &str, active: bool, is_text: bool) -> Line<'static> {
    let value_style = if active {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let value = match (active, is_text) {
        (true, true) => format!("{value}_"),
        (true, false) => format!("< {value} >"),
        (false, _) => value.to_string(),
    };
    Line::from(vec![
        Span::styled(format!("{label:<15}"), Style::default().fg(Color::Gray)),
        Span::styled(value, value_style),
    ])
}

fn draw_form(frame: &mut Frame, area: Rect, title: &str, mut fields: Vec<Line<'static>>) {
    fields.push(Line::from(""));
    fields.push(Line::from(Span::styled(
        "Tab: next field  Left/Right: change  Enter: save  Esc: cancel",
        Style::default().fg(Color::DarkGray),
    )));

    let popup_area = centered_rect(60, 40, area);
    frame.render_widget(Clear, popup_area);
    frame.render_widget(
        Paragraph::new(fields)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title(title.to_string())),
        popup_area,
    );
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
