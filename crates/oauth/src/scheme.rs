use serde::{Deserialize, Serialize};

/// How the authorization code reaches the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    /// Yandex redirects to the URL registered for the application; the code
    /// has to be harvested there and handed back.
    Code,
    /// Yandex redirects to a fixed page that shows the code to the user, who
    /// types it into the application.
    ScreenCode,
    /// Like [`AuthScheme::Code`], but a loopback listener receives the
    /// redirect. The registered redirect URL must point at `127.0.0.1` or
    /// `localhost` on a non-privileged port; `http://127.0.0.1:8127/` is used
    /// when none is given.
    LocalCode,
}

impl AuthScheme {
    pub const ALL: [Self; 3] = [Self::Code, Self::ScreenCode, Self::LocalCode];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::ScreenCode => "screen_code",
            Self::LocalCode => "local_code",
        }
    }
}

impl std::fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuthScheme {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|scheme| scheme.as_str() == normalized)
            .ok_or_else(|| format!("unknown auth scheme '{value}' (expected code, screen_code or local_code)"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_dashes_and_case() {
        assert_eq!("local-code".parse::<AuthScheme>(), Ok(AuthScheme::LocalCode));
        assert_eq!("SCREEN_CODE".parse::<AuthScheme>(), Ok(AuthScheme::ScreenCode));
        assert_eq!(" code ".parse::<AuthScheme>(), Ok(AuthScheme::Code));
        assert!("implicit".parse::<AuthScheme>().is_err());
    }

    #[test]
    fn display_matches_serde_name() {
        for scheme in AuthScheme::ALL {
            let json = serde_json::to_string(&scheme).unwrap();
            assert_eq!(json, format!("\"{scheme}\""));
        }
    }
}
