use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub imap: ImapConfig,
    pub download: DownloadConfig,
    /// Filtros "assunto contém"; lista vazia = todos os emails não lidos
    pub filtros_assunto: Vec<String>,
    pub intervalo_horas: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub username: String,
    pub password: String,
    /// Timeout aplicado a cada operação de rede (segundos)
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DownloadConfig {
    pub pasta_raiz: PathBuf,
    pub subpasta_temporaria: String,
    pub subpasta_invalida: String,
}

impl DownloadConfig {
    /// Pasta onde os anexos são gravados antes do roteamento
    pub fn pasta_temporaria(&self) -> PathBuf {
        self.pasta_raiz.join(&self.subpasta_temporaria)
    }

    /// Destino das notas sem CNPJ identificável
    pub fn pasta_invalida(&self) -> PathBuf {
        self.pasta_raiz.join(&self.subpasta_invalida)
    }
}

impl Config {
    pub fn new() -> Result<Self> {
        // Verificar que as variáveis essenciais estão definidas
        Self::check_required_env_vars()?;

        // Configuração carregada das variáveis de ambiente
        Ok(Config {
            imap: ImapConfig {
                host: std::env::var("IMAP_HOST")
                    .expect("IMAP_HOST deve estar definido"),
                port: std::env::var("IMAP_PORT")
                    .unwrap_or_else(|_| "993".to_string())
                    .parse()
                    .unwrap_or(993),
                use_tls: std::env::var("IMAP_USE_TLS")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()
                    .unwrap_or(true),
                username: std::env::var("IMAP_USERNAME")
                    .expect("IMAP_USERNAME deve estar definido"),
                password: std::env::var("IMAP_PASSWORD")
                    .expect("IMAP_PASSWORD deve estar definido"),
                timeout_secs: std::env::var("IMAP_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30),
            },
            download: DownloadConfig {
                pasta_raiz: PathBuf::from(
                    std::env::var("PASTA_RAIZ").unwrap_or_else(|_| "./notas".to_string()),
                ),
                subpasta_temporaria: std::env::var("PASTA_TEMPORARIA")
                    .unwrap_or_else(|_| "temp".to_string()),
                subpasta_invalida: std::env::var("PASTA_INVALIDA")
                    .unwrap_or_else(|_| "invalidos".to_string()),
            },
            filtros_assunto: std::env::var("ASSUNTO_CONTEM")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            intervalo_horas: std::env::var("INTERVALO_HORAS")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .unwrap_or(1),
        })
    }

    fn check_required_env_vars() -> Result<()> {
        let required_vars = ["IMAP_HOST", "IMAP_USERNAME", "IMAP_PASSWORD"];

        let mut missing_vars = Vec::new();

        for var in &required_vars {
            if std::env::var(var).is_err() {
                missing_vars.push(*var);
            }
        }

        if !missing_vars.is_empty() {
            anyhow::bail!(
                "Variáveis de ambiente faltando: {}\n\
                 \n\
                 💡 Soluções:\n\
                 1. Criar um arquivo .env com as credenciais da caixa de entrada:\n\
                    cp .env.example .env\n\
                    # Depois editar o .env com os seus valores\n\
                 \n\
                 2. Ou definir as variáveis manualmente:\n\
                    export IMAP_HOST=imap.example.com.br\n\
                    export IMAP_USERNAME=fiscal@example.com.br\n\
                    export IMAP_PASSWORD=...\n\
                    cargo run -- --check-config",
                missing_vars.join(", ")
            );
        }

        Ok(())
    }
}
