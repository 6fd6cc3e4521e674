/*!
Exécuteur distant simulé pour tests sans SSH

Remplace `SshExecutor` dans les tests des collecteurs.
Les réponses sont scriptées par hôte et par fragment de commande,
toutes les connexions et commandes sont enregistrées pour les assertions.
*/

use expeca_collector::{CommandOutput, Host, RemoteError, RemoteExecutor, RemoteSession};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedCommand {
    pub host: String,
    pub command: String,
}

#[derive(Debug, Clone)]
enum Scripted {
    Output(CommandOutput),
    ChannelFailure(String),
}

#[derive(Debug, Default)]
struct MockState {
    unreachable: HashMap<String, String>,
    /// hôte -> (fragment de commande, réponse), la dernière entrée gagne
    scripts: HashMap<String, Vec<(String, Scripted)>>,
    connects: Vec<String>,
    executed: Vec<ExecutedCommand>,
}

/// Exécuteur distant qui rejoue des réponses scriptées
#[derive(Debug, Clone, Default)]
pub struct MockRemote {
    state: Arc<Mutex<MockState>>,
}

pub struct MockSession {
    host: String,
    state: Arc<Mutex<MockState>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// La connexion à cet hôte échouera
    pub fn unreachable(&self, host: &str, reason: &str) -> &Self {
        self.state
            .lock()
            .unwrap()
            .unreachable
            .insert(host.to_string(), reason.to_string());
        log::info!("🚫 [MOCK] {} unreachable: {}", host, reason);
        self
    }

    /// Les commandes contenant `marker` renverront ces lignes
    pub fn respond(&self, host: &str, marker: &str, lines: Vec<String>) -> &Self {
        let output = CommandOutput {
            stdout: lines.iter().map(|l| format!("{}\n", l)).collect(),
            ..CommandOutput::default()
        };
        self.script(host, marker, Scripted::Output(output))
    }

    /// Les commandes contenant `marker` sortiront avec ce code, sans sortie
    pub fn respond_exit(&self, host: &str, marker: &str, exit_code: i32) -> &Self {
        let output = CommandOutput {
            exit_code,
            ..CommandOutput::default()
        };
        self.script(host, marker, Scripted::Output(output))
    }

    /// Les commandes contenant `marker` échoueront au niveau du canal
    pub fn fail_command(&self, host: &str, marker: &str, reason: &str) -> &Self {
        self.script(host, marker, Scripted::ChannelFailure(reason.to_string()))
    }

    fn script(&self, host: &str, marker: &str, scripted: Scripted) -> &Self {
        self.state
            .lock()
            .unwrap()
            .scripts
            .entry(host.to_string())
            .or_default()
            .push((marker.to_string(), scripted));
        self
    }

    /// Toutes les commandes exécutées (pour assertions de tests)
    pub fn executed_commands(&self) -> Vec<ExecutedCommand> {
        self.state.lock().unwrap().executed.clone()
    }

    /// Commandes exécutées sur un hôte donné
    pub fn commands_for(&self, host: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .executed
            .iter()
            .filter(|c| c.host == host)
            .map(|c| c.command.clone())
            .collect()
    }

    /// Hôtes pour lesquels une connexion a été tentée, dans l'ordre
    pub fn connect_attempts(&self) -> Vec<String> {
        self.state.lock().unwrap().connects.clone()
    }

    /// Reset scripts et historique
    pub fn clear(&self) {
        *self.state.lock().unwrap() = MockState::default();
    }
}

impl RemoteExecutor for MockRemote {
    type Session = MockSession;

    async fn connect(&self, host: &Host) -> Result<MockSession, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.connects.push(host.name.clone());

        if let Some(reason) = state.unreachable.get(&host.name) {
            return Err(RemoteError::Connect {
                host: host.name.clone(),
                reason: reason.clone(),
            });
        }

        Ok(MockSession {
            host: host.name.clone(),
            state: Arc::clone(&self.state),
        })
    }
}

impl RemoteSession for MockSession {
    async fn exec(&mut self, command: &str) -> Result<CommandOutput, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.executed.push(ExecutedCommand {
            host: self.host.clone(),
            command: command.to_string(),
        });
        log::debug!("📤 [MOCK] {} $ {}", self.host, command);

        let scripted = state
            .scripts
            .get(&self.host)
            .and_then(|entries| entries.iter().rev().find(|(marker, _)| command.contains(marker.as_str())))
            .map(|(_, scripted)| scripted.clone());

        match scripted {
            Some(Scripted::Output(output)) => Ok(output),
            Some(Scripted::ChannelFailure(reason)) => Err(RemoteError::Channel {
                host: self.host.clone(),
                reason,
            }),
            // Rien de scripté : comme un grep sans résultat en fin de pipeline
            None => Ok(CommandOutput::default()),
        }
    }
}
