/*!
# EXPECA DevKit - Stubs et Utilitaires pour les tests des collecteurs

Bibliothèque facilitant les tests des collecteurs avec:
- Exécuteur distant simulé (pas de SSH réel)
- Générateurs de lignes syslog ptp4l / phc2sys
- Harness de test avec event log temporaire et horloge fixe
*/

pub mod mock_remote;
pub mod syslog_lines;
pub mod test_utils;

pub use mock_remote::{ExecutedCommand, MockRemote};
pub use syslog_lines::SyslogLineBuilder;
pub use test_utils::TestHarness;
