//! Structural application menu model.
//!
//! The core only decides *what* the menu contains; presentation belongs to
//! the UI shell. Building is a pure function of the platform, so setting
//! the menu twice replaces it with an identical structure instead of
//! appending duplicate entries.

use crate::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuRole {
    About,
    Close,
    Copy,
    Cut,
    Delete,
    ForceReload,
    Hide,
    HideOthers,
    Minimize,
    Paste,
    PasteAndMatchStyle,
    Quit,
    Reload,
    ResetZoom,
    SelectAll,
    Services,
    ToggleDevTools,
    ToggleFullscreen,
    Unhide,
    ZoomIn,
    ZoomOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    Role(MenuRole),
    Separator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Menu {
    pub label: String,
    pub items: Vec<MenuItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppMenu {
    pub menus: Vec<Menu>,
}

fn menu(label: &str, items: Vec<MenuItem>) -> Menu {
    Menu {
        label: label.to_string(),
        items,
    }
}

/// Build the application menu for the given platform.
pub fn build_menu(platform: Platform) -> AppMenu {
    use MenuItem::{Role, Separator};
    use MenuRole as R;

    let mut menus = vec![
        menu("File", vec![Role(R::Quit)]),
        menu(
            "Edit",
            vec![
                Role(R::Cut),
                Role(R::Copy),
                Role(R::Paste),
                Role(R::PasteAndMatchStyle),
                Role(R::Delete),
                Role(R::SelectAll),
            ],
        ),
        menu(
            "View",
            vec![
                Role(R::Reload),
                Role(R::ForceReload),
                Role(R::ToggleDevTools),
                Separator,
                Role(R::ResetZoom),
                Role(R::ZoomIn),
                Role(R::ZoomOut),
                Separator,
                Role(R::ToggleFullscreen),
            ],
        ),
        menu("Window", vec![Role(R::Minimize), Role(R::Close)]),
    ];

    if platform == Platform::MacOs {
        menus.insert(
            0,
            menu(
                "FreeTube",
                vec![
                    Role(R::About),
                    Separator,
                    Role(R::Services),
                    Separator,
                    Role(R::Hide),
                    Role(R::HideOthers),
                    Role(R::Unhide),
                    Separator,
                    Role(R::Quit),
                ],
            ),
        );
    }

    AppMenu { menus }
}
