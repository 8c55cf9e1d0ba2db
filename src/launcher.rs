//! Background application launchers.
//!
//! Every launch follows the same path: resolve the program in the activated
//! environment, spawn it detached, register it immediately, then (for network
//! services) poll its port until it answers or the allowed number of checks runs out.

use indicatif::{ProgressBar, ProgressStyle};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::activation::ActivationConfig;
use crate::config::{
    Settings, EDITOR_DEFAULT_PROJECT, EDITOR_ENTRY_FILE, LLM_MODELS_ENV, LLM_SERVER_ID,
    PORT_PROBE_TIMEOUT, STREAMLIT_DEMO_FILE,
};
use crate::error::LaunchError;
use crate::platform::PlatformOps;
use crate::process::{generate_id, ProcessKind, ProcessRecord, ProcessRegistry};
use crate::signal;
use crate::utils::config_paths::EnvPaths;

const STREAMLIT_DEMO: &str = r#"import streamlit as st
import pandas as pd
import numpy as np

st.title("AI Environment Demo")
st.write("Welcome to your portable AI development environment!")

data = pd.DataFrame({
    "x": np.random.randn(100),
    "y": np.random.randn(100),
})

st.subheader("Sample Chart")
st.line_chart(data)

st.subheader("Sample Data")
st.dataframe(data.head())
"#;

const EDITOR_MAIN_PY: &str = r#""""
Basic LLM example. Start the local LLM server first.
"""

import json
import urllib.request


def query(prompt, model="phi:2.7b", host="127.0.0.1", port=11434):
    body = json.dumps({"model": model, "prompt": prompt, "stream": False}).encode()
    request = urllib.request.Request(
        f"http://{host}:{port}/api/generate",
        data=body,
        headers={"Content-Type": "application/json"},
    )
    with urllib.request.urlopen(request, timeout=60) as response:
        return json.load(response).get("response", "No response received")


if __name__ == "__main__":
    print(query("Say hello in one sentence."))
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum AppKind {
    #[value(name = "vscode")]
    Editor,
    Jupyter,
    Streamlit,
    #[value(name = "tensorboard")]
    TensorBoard,
    Mlflow,
    #[value(name = "llm-server")]
    LlmServer,
}

impl AppKind {
    pub const ALL: [AppKind; 6] = [
        AppKind::Editor,
        AppKind::Jupyter,
        AppKind::Streamlit,
        AppKind::TensorBoard,
        AppKind::Mlflow,
        AppKind::LlmServer,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AppKind::Editor => "VS Code",
            AppKind::Jupyter => "Jupyter Lab",
            AppKind::Streamlit => "Streamlit Demo",
            AppKind::TensorBoard => "TensorBoard",
            AppKind::Mlflow => "MLflow UI",
            AppKind::LlmServer => "Ollama Server",
        }
    }

    /// Listening port, `None` for desktop applications.
    pub fn port(self, settings: &Settings) -> Option<u16> {
        let ports = &settings.ports;
        match self {
            AppKind::Editor => None,
            AppKind::Jupyter => Some(ports.jupyter),
            AppKind::Streamlit => Some(ports.streamlit),
            AppKind::TensorBoard => Some(ports.tensorboard),
            AppKind::Mlflow => Some(ports.mlflow),
            AppKind::LlmServer => Some(ports.llm_server),
        }
    }
}

/// Everything needed to start and track one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub id: String,
    pub name: String,
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: PathBuf,
    pub env: Vec<(String, OsString)>,
    pub port: Option<u16>,
    pub url: Option<String>,
    pub kind: ProcessKind,
    /// Project folder opened by the process, stored as `project_path`
    pub project: Option<PathBuf>,
}

impl LaunchSpec {
    fn new(app: AppKind, id: String, program: impl Into<PathBuf>, cwd: &Path) -> Self {
        Self {
            id,
            name: app.label().to_string(),
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
            env: Vec::new(),
            port: None,
            url: None,
            kind: ProcessKind::WebService,
            project: None,
        }
    }

    fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn serving(mut self, port: u16, url: String) -> Self {
        self.port = Some(port);
        self.url = Some(url);
        self
    }

    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    TimedOut,
    Interrupted,
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchReport {
    pub id: String,
    pub name: String,
    pub pid: u32,
    pub url: Option<String>,
    pub readiness: Readiness,
}

pub struct Launcher<'a> {
    paths: &'a EnvPaths,
    settings: &'a Settings,
    activation: &'a ActivationConfig,
    platform: &'a dyn PlatformOps,
}

impl<'a> Launcher<'a> {
    pub fn new(
        paths: &'a EnvPaths,
        settings: &'a Settings,
        activation: &'a ActivationConfig,
        platform: &'a dyn PlatformOps,
    ) -> Self {
        Self {
            paths,
            settings,
            activation,
            platform,
        }
    }

    /// Build the launch description for `app`, preparing any files it needs.
    pub fn spec(&self, app: AppKind) -> Result<LaunchSpec, LaunchError> {
        let projects = &self.paths.projects_dir;
        let root = &self.paths.root;
        let prepare = |dir: &Path| {
            fs::create_dir_all(dir).map_err(|err| prepare_error(app, dir, err))
        };

        let mut spec = match app {
            AppKind::Editor => {
                let project = projects.join(EDITOR_DEFAULT_PROJECT);
                prepare(&project)?;
                let entry = project.join(EDITOR_ENTRY_FILE);
                write_if_missing(app, &entry, EDITOR_MAIN_PY)?;

                let mut spec =
                    LaunchSpec::new(app, generate_id("vscode"), &self.settings.editor_binary, &project)
                        .with_args([project.clone().into_os_string(), entry.into_os_string()]);
                spec.kind = ProcessKind::Application;
                spec.project = Some(project);
                spec
            }
            AppKind::Jupyter => {
                prepare(projects)?;
                let port = self.settings.ports.jupyter;
                LaunchSpec::new(app, format!("jupyter_lab_server_{port}"), "jupyter", projects)
                    .with_args(["lab".to_string(), "--no-browser".to_string(), format!("--port={port}")])
                    .serving(port, format!("http://localhost:{port}/lab"))
            }
            AppKind::Streamlit => {
                prepare(projects)?;
                let port = self.settings.ports.streamlit;
                let demo = projects.join(STREAMLIT_DEMO_FILE);
                write_if_missing(app, &demo, STREAMLIT_DEMO)?;
                LaunchSpec::new(app, generate_id("streamlit"), "streamlit", projects)
                    .with_args([
                        OsString::from("run"),
                        demo.into_os_string(),
                        format!("--server.port={port}").into(),
                        "--server.headless=true".into(),
                    ])
                    .serving(port, format!("http://localhost:{port}"))
            }
            AppKind::TensorBoard => {
                let logs = projects.join("logs");
                prepare(&logs)?;
                let port = self.settings.ports.tensorboard;
                LaunchSpec::new(app, generate_id("tensorboard"), "tensorboard", root)
                    .with_args([format!("--logdir={}", logs.display()), format!("--port={port}")])
                    .serving(port, format!("http://localhost:{port}"))
            }
            AppKind::Mlflow => {
                let runs = projects.join("mlruns");
                prepare(&runs)?;
                let port = self.settings.ports.mlflow;
                LaunchSpec::new(app, generate_id("mlflow"), "mlflow", root)
                    .with_args([
                        "ui".to_string(),
                        "--backend-store-uri".to_string(),
                        file_uri(&runs),
                        format!("--port={port}"),
                    ])
                    .serving(port, format!("http://localhost:{port}"))
            }
            AppKind::LlmServer => {
                prepare(&self.paths.models_dir)?;
                let port = self.settings.ports.llm_server;
                let mut spec = LaunchSpec::new(app, LLM_SERVER_ID.to_string(), &self.settings.llm_server_binary, root)
                    .with_args(["serve"])
                    .serving(port, format!("http://127.0.0.1:{port}"));
                spec.env.push((
                    LLM_MODELS_ENV.to_string(),
                    self.paths.models_dir.clone().into_os_string(),
                ));
                spec.kind = ProcessKind::Server;
                spec
            }
        };

        spec.program = self
            .activation
            .resolve_program(&spec.program)
            .ok_or_else(|| LaunchError::ProgramNotFound {
                program: spec.program.display().to_string(),
            })?;
        Ok(spec)
    }

    /// Launch one of the known applications.
    pub fn launch(&self, registry: &mut ProcessRegistry, app: AppKind) -> Result<LaunchReport, LaunchError> {
        if let (AppKind::LlmServer, Some(port)) = (app, app.port(self.settings)) {
            if port_open(port) {
                return Err(LaunchError::AlreadyRunning {
                    name: app.label().to_string(),
                    port,
                });
            }
        }
        if app == AppKind::Streamlit {
            for id in registry.ids_with_prefix("streamlit") {
                info!(id = %id, "stopping previous streamlit instance");
                registry.stop(&id);
            }
        }

        let spec = self.spec(app)?;
        self.start(registry, spec)
    }

    /// Run an arbitrary command line through the platform shell and track it.
    pub fn launch_custom(
        &self,
        registry: &mut ProcessRegistry,
        name: &str,
        command_line: &str,
    ) -> Result<LaunchReport, LaunchError> {
        let mut command = self.platform.shell_command(command_line);
        command.current_dir(&self.paths.root);
        self.activation.apply(&mut command);

        let pid = self
            .platform
            .spawn_detached(&mut command)
            .map_err(|source| LaunchError::Spawn {
                name: name.to_string(),
                source,
            })?;

        let id = generate_id("custom");
        let record = ProcessRecord::new(name, pid, command_line, None).with_kind(ProcessKind::Custom);
        registry
            .register_record(id.clone(), record)
            .map_err(|source| LaunchError::Registration {
                name: name.to_string(),
                source,
            })?;

        Ok(LaunchReport {
            id,
            name: name.to_string(),
            pid,
            url: None,
            readiness: Readiness::NotApplicable,
        })
    }

    /// Spawn, register, then wait for readiness.
    pub fn start(&self, registry: &mut ProcessRegistry, spec: LaunchSpec) -> Result<LaunchReport, LaunchError> {
        let mut command = Command::new(&spec.program);
        command.args(&spec.args).current_dir(&spec.cwd);
        self.activation.apply(&mut command);
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        let pid = self
            .platform
            .spawn_detached(&mut command)
            .map_err(|source| LaunchError::Spawn {
                name: spec.name.clone(),
                source,
            })?;
        info!(name = %spec.name, pid, "launched");

        let mut record = ProcessRecord::new(&spec.name, pid, spec.command_line(), spec.url.clone())
            .with_kind(spec.kind.clone());
        if let Some(project) = &spec.project {
            record = record.with_extra("project_path", project.display().to_string());
        }
        registry
            .register_record(spec.id.clone(), record)
            .map_err(|source| LaunchError::Registration {
                name: spec.name.clone(),
                source,
            })?;

        let readiness = match spec.port {
            Some(port) => wait_until_ready(
                port,
                self.settings.readiness_checks,
                self.settings.readiness_interval(),
                &format!("Waiting for {} on port {}", spec.name, port),
            ),
            None => Readiness::NotApplicable,
        };
        if readiness == Readiness::TimedOut {
            warn!(name = %spec.name, "started but not answering yet");
        }

        Ok(LaunchReport {
            id: spec.id,
            name: spec.name,
            pid,
            url: spec.url,
            readiness,
        })
    }
}

fn prepare_error(app: AppKind, path: &Path, err: io::Error) -> LaunchError {
    LaunchError::Prepare {
        name: app.label().to_string(),
        message: format!("{}: {}", path.display(), err),
    }
}

fn write_if_missing(app: AppKind, path: &Path, contents: &str) -> Result<(), LaunchError> {
    if path.exists() {
        return Ok(());
    }
    fs::write(path, contents).map_err(|err| prepare_error(app, path, err))
}

/// Whether something accepts TCP connections on localhost:`port`.
pub fn port_open(port: u16) -> bool {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    TcpStream::connect_timeout(&addr, PORT_PROBE_TIMEOUT).is_ok()
}

/// Poll `port` up to `checks` times, `interval` apart. Ctrl-C ends the wait.
pub fn wait_until_ready(port: u16, checks: u32, interval: Duration, message: &str) -> Readiness {
    let spinner = ProgressBar::new_spinner()
        .with_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        )
        .with_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));

    let mut readiness = Readiness::TimedOut;
    for check in 1..=checks {
        if signal::take_interrupt() {
            readiness = Readiness::Interrupted;
            break;
        }
        if port_open(port) {
            debug!(port, check, "port answering");
            readiness = Readiness::Ready;
            break;
        }
        thread::sleep(interval);
    }

    spinner.finish_and_clear();
    readiness
}

/// Open `url` in the default browser without waiting for it.
pub fn open_browser(url: &str) -> io::Result<()> {
    open::that_detached(url)
}

fn file_uri(path: &Path) -> String {
    let text = path.display().to_string().replace('\\', "/");
    if text.starts_with('/') {
        format!("file://{text}")
    } else {
        format!("file:///{text}")
    }
}
