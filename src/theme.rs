use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub article_fill: String,
    pub article_border: String,
    pub question_fill: String,
    pub question_border: String,
    pub text_color: String,
    pub muted_text_color: String,
    pub line_color: String,
    pub active_border: String,
    pub background: String,
}

impl Theme {
    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 13.0,
            article_fill: "#F8FAFF".to_string(),
            article_border: "#C7D2E5".to_string(),
            question_fill: "#EEF2F8".to_string(),
            question_border: "#D7E0F0".to_string(),
            text_color: "#1C2430".to_string(),
            muted_text_color: "#5B6B85".to_string(),
            line_color: "#7A8AA6".to_string(),
            active_border: "#3B82F6".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }

    pub fn classic() -> Self {
        Self {
            font_family: "\"trebuchet ms\", verdana, arial, sans-serif".to_string(),
            font_size: 16.0,
            article_fill: "#ECECFF".to_string(),
            article_border: "#9370DB".to_string(),
            question_fill: "#FFFFDE".to_string(),
            question_border: "#AAAA33".to_string(),
            text_color: "#333333".to_string(),
            muted_text_color: "#666666".to_string(),
            line_color: "#333333".to_string(),
            active_border: "#D9480F".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::modern()
    }
}
