use serde::Deserialize;

/// Voice identity and system instruction sent to the live endpoint on setup.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PersonaConfig {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    pub system_instruction: String,

    #[serde(default = "default_voice_name")]
    pub voice_name: String,

    #[serde(default = "default_accent_color")]
    pub accent_color: String,
}

fn default_voice_name() -> String {
    "Zephyr".to_string()
}

fn default_accent_color() -> String {
    "#3b82f6".to_string()
}

pub const YULETIDE_CORE: &str = "yuletide_core";
pub const AGENT_SANTA: &str = "agent_santa";

/// The personas shipped with the demo.
pub fn builtin_personas() -> Vec<PersonaConfig> {
    vec![
        PersonaConfig {
            id: YULETIDE_CORE.to_string(),
            name: "YULETIDE Core".to_string(),
            description: "System-level technical intelligence assistant.".to_string(),
            system_instruction: "You are the core intelligence of Project YULETIDE. \
                You are helpful, technical, and precise. You explain complex edge AI \
                concepts simply."
                .to_string(),
            voice_name: "Zephyr".to_string(),
            accent_color: "#3b82f6".to_string(),
        },
        PersonaConfig {
            id: AGENT_SANTA.to_string(),
            name: "Agent Santa".to_string(),
            description: "Festive persona for the holiday demo.".to_string(),
            system_instruction: "You are Agent Santa, an advanced AI recreation of Santa \
                Claus. You are jolly, warm, and tech-savvy. You talk about the joy of \
                giving and the technical wonders of your North Pole workshop."
                .to_string(),
            voice_name: "Puck".to_string(),
            accent_color: "#ef4444".to_string(),
        },
    ]
}
