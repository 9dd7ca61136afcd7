use std::{path::PathBuf, time::Duration};

/// Options for launching a new Chrome/Chromium instance
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Run without a visible window
    pub headless: bool,

    /// Browser window width in pixels
    pub window_width: u32,

    /// Browser window height in pixels
    pub window_height: u32,

    /// Path to a Chrome/Chromium binary; auto-detected when unset
    pub chrome_path: Option<PathBuf>,

    /// Persistent profile directory
    pub user_data_dir: Option<PathBuf>,

    /// Run Chrome with its sandbox enabled
    pub sandbox: bool,

    /// Upper bound for a single page load
    pub navigation_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1280,
            window_height: 1024,
            chrome_path: None,
            user_data_dir: None,
            sandbox: true,
            navigation_timeout: Duration::from_secs(30),
        }
    }
}

impl LaunchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn window_size(mut self, width: u32, height: u32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }

    pub fn chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    pub fn user_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.user_data_dir = Some(dir.into());
        self
    }

    pub fn sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }
}

/// Options for attaching to an already running browser
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// DevTools WebSocket URL, e.g. `ws://127.0.0.1:9222/devtools/browser/<id>`
    pub ws_url: String,

    /// Upper bound for a single page load
    pub navigation_timeout: Duration,
}

impl ConnectionOptions {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self { ws_url: ws_url.into(), navigation_timeout: Duration::from_secs(30) }
    }

    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }
}
