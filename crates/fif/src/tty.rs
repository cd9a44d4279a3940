use std::io::IsTerminal;

/// Whether stdin and stdout are both attached to a terminal; the UI needs both
pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}
