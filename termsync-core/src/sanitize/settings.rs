//! Settings sections and where they live in the raw configuration.

use crate::models::SyncableSettings;
use crate::tree::copy_fields;
use serde_json::{Map, Value};

/// Where a section is read from and written back to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Scalars at the configuration root
    Root,
    /// A top-level key
    Key(&'static str),
    /// A key inside a top-level block
    Nested(&'static str, &'static str),
}

/// Which fields of a map section are syncable
#[derive(Debug, Clone, Copy)]
pub enum Fields {
    Only(&'static [&'static str]),
    All,
}

/// Map-shaped settings sections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapSectionId {
    Terminal,
    Appearance,
    Window,
    Hotkeys,
    SshAgent,
    Application,
}

/// Sequence-shaped settings sections, synced as whole arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSectionId {
    ColorSchemes,
    PluginBlacklist,
    QuickCommands,
}

#[derive(Debug, Clone, Copy)]
pub struct MapSection {
    pub id: MapSectionId,
    pub slot: Slot,
    pub fields: Fields,
}

#[derive(Debug, Clone, Copy)]
pub struct ListSection {
    pub id: ListSectionId,
    pub slot: Slot,
}

/// Terminal field carrying a filesystem path
pub const BACKGROUND_IMAGE_FIELD: &str = "backgroundImage";

const TERMINAL_FIELDS: &[&str] = &[
    "fontSize",
    "font",
    "fallbackFont",
    "fontWeight",
    "fontWeightBold",
    "lineHeight",
    "ligatures",
    "cursor",
    "cursorBlink",
    "colorScheme",
    "lightColorScheme",
    "background",
    BACKGROUND_IMAGE_FIELD,
    "bell",
    "bracketedPaste",
    "copyOnSelect",
    "rightClick",
    "pasteOnMiddleClick",
    "scrollOnInput",
    "altIsMeta",
    "wordSeparator",
    "searchOptions",
    "hideTabIndex",
    "hideCloseButton",
    "hideTabOptionsButton",
    "showBuiltinProfiles",
    "showRecentProfiles",
    "warnOnMultilinePaste",
    "trimWhitespaceOnPaste",
    "drawBoldTextInBrightColors",
    "minimumContrastRatio",
    "detectProgress",
];

const APPEARANCE_FIELDS: &[&str] = &[
    "theme",
    "css",
    "tabsLocation",
    "cycleTabs",
    "flexTabs",
    "colorSchemeMode",
    "lastTabClosesWindow",
    "spaciness",
];

const WINDOW_FIELDS: &[&str] = &[
    "frame",
    "opacity",
    "vibrancy",
    "vibrancyType",
    "dock",
    "dockScreen",
    "dockFill",
    "dockSpace",
    "dockHideOnBlur",
    "dockAlwaysOnTop",
    "dockHideTitlebar",
];

// agentPath and winSCPPath point at local executables and stay behind
const SSH_AGENT_FIELDS: &[&str] = &[
    "agentType",
    "x11Display",
    "verifyHostKeys",
    "clearServiceMessagesOnConnect",
];

const APPLICATION_FIELDS: &[&str] = &[
    "language",
    "enableAnalytics",
    "enableWelcomeTab",
    "recoverTabs",
    "enableAutomaticUpdates",
    "hideTray",
    "electronFlags",
];

pub const MAP_SECTIONS: &[MapSection] = &[
    MapSection {
        id: MapSectionId::Terminal,
        slot: Slot::Key("terminal"),
        fields: Fields::Only(TERMINAL_FIELDS),
    },
    MapSection {
        id: MapSectionId::Appearance,
        slot: Slot::Key("appearance"),
        fields: Fields::Only(APPEARANCE_FIELDS),
    },
    MapSection {
        id: MapSectionId::Window,
        slot: Slot::Key("appearance"),
        fields: Fields::Only(WINDOW_FIELDS),
    },
    MapSection {
        id: MapSectionId::Hotkeys,
        slot: Slot::Key("hotkeys"),
        fields: Fields::All,
    },
    MapSection {
        id: MapSectionId::SshAgent,
        slot: Slot::Key("ssh"),
        fields: Fields::Only(SSH_AGENT_FIELDS),
    },
    MapSection {
        id: MapSectionId::Application,
        slot: Slot::Root,
        fields: Fields::Only(APPLICATION_FIELDS),
    },
];

pub const LIST_SECTIONS: &[ListSection] = &[
    ListSection {
        id: ListSectionId::ColorSchemes,
        slot: Slot::Nested("terminal", "customColorSchemes"),
    },
    ListSection {
        id: ListSectionId::PluginBlacklist,
        slot: Slot::Key("pluginBlacklist"),
    },
    ListSection {
        id: ListSectionId::QuickCommands,
        slot: Slot::Nested("qc", "cmds"),
    },
];

impl SyncableSettings {
    pub fn map_section(&self, id: MapSectionId) -> Option<&Map<String, Value>> {
        match id {
            MapSectionId::Terminal => self.terminal.as_ref(),
            MapSectionId::Appearance => self.appearance.as_ref(),
            MapSectionId::Window => self.window.as_ref(),
            MapSectionId::Hotkeys => self.hotkeys.as_ref(),
            MapSectionId::SshAgent => self.ssh_agent.as_ref(),
            MapSectionId::Application => self.application.as_ref(),
        }
    }

    pub fn map_section_mut(&mut self, id: MapSectionId) -> &mut Option<Map<String, Value>> {
        match id {
            MapSectionId::Terminal => &mut self.terminal,
            MapSectionId::Appearance => &mut self.appearance,
            MapSectionId::Window => &mut self.window,
            MapSectionId::Hotkeys => &mut self.hotkeys,
            MapSectionId::SshAgent => &mut self.ssh_agent,
            MapSectionId::Application => &mut self.application,
        }
    }

    pub fn list_section(&self, id: ListSectionId) -> Option<&Vec<Value>> {
        match id {
            ListSectionId::ColorSchemes => self.color_schemes.as_ref(),
            ListSectionId::PluginBlacklist => self.plugin_blacklist.as_ref(),
            ListSectionId::QuickCommands => self.quick_commands.as_ref(),
        }
    }

    pub fn list_section_mut(&mut self, id: ListSectionId) -> &mut Option<Vec<Value>> {
        match id {
            ListSectionId::ColorSchemes => &mut self.color_schemes,
            ListSectionId::PluginBlacklist => &mut self.plugin_blacklist,
            ListSectionId::QuickCommands => &mut self.quick_commands,
        }
    }
}

/// Drop map section fields outside their allow-lists
///
/// Sections that end up empty become absent. List sections are kept as is.
pub fn restrict_settings(settings: &SyncableSettings) -> SyncableSettings {
    let mut restricted = settings.clone();
    for section in MAP_SECTIONS {
        let Fields::Only(fields) = section.fields else {
            continue;
        };
        let slot = restricted.map_section_mut(section.id);
        if let Some(map) = slot.take() {
            let projected = copy_fields(&map, fields);
            *slot = (!projected.is_empty()).then_some(projected);
        }
    }
    restricted
}

/// Read the value at a slot, if present
pub fn read_slot(raw: &Value, slot: Slot) -> Option<&Value> {
    match slot {
        Slot::Root => Some(raw),
        Slot::Key(key) => raw.get(key),
        Slot::Nested(outer, inner) => raw.get(outer)?.get(inner),
    }
}

/// Get a mutable reference to a slot, creating empty blocks on the way
///
/// Returns `None` only when `raw` itself is not a mapping.
pub fn slot_mut(raw: &mut Value, slot: Slot) -> Option<&mut Value> {
    match slot {
        Slot::Root => raw.is_object().then_some(raw),
        Slot::Key(key) => {
            let root = raw.as_object_mut()?;
            Some(
                root.entry(key.to_string())
                    .or_insert_with(|| Value::Object(Map::new())),
            )
        }
        Slot::Nested(outer, inner) => {
            let root = raw.as_object_mut()?;
            let block = root
                .entry(outer.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !block.is_object() {
                *block = Value::Object(Map::new());
            }
            block
                .as_object_mut()
                .map(|block| block.entry(inner.to_string()).or_insert(Value::Null))
        }
    }
}
