/// Application actions representing all possible state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,

    // Navigation
    NextTab,
    PrevTab,
    Up,
    Down,
    Left,
    Right,

    // Modal forms
    OpenNewForm,
    OpenEditForm,
    NextField,
    PrevField,
    SubmitForm,
    CancelInput,

    // Deletion
    RequestDelete,
    ConfirmDelete,

    // Search
    StartSearch,
    EndSearch,

    // Text input
    InputChar(char),
    InputBackspace,

    // Data refresh
    Refresh,
    Heartbeat,

    // Reports
    ExportWorkbook,
    PrintReport,

    // UI toggles
    ToggleHelp,
}
