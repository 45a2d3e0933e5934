use anyhow::{Context, Result};
use async_imap::Session;
use async_native_tls::{TlsConnector, TlsStream};
use futures::stream::StreamExt;
use log::{debug, info, warn};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::ImapConfig;

pub struct ImapClient {
    session: Session<TlsStream<TcpStream>>,
    op_timeout: Duration,
}

impl ImapClient {
    /// Conecta, autentica e retorna a sessão pronta para uso.
    /// Qualquer falha aqui é fatal para o ciclo atual.
    pub async fn connect(config: &ImapConfig) -> Result<Self> {
        if !config.use_tls {
            anyhow::bail!("Conexão sem TLS não é suportada (IMAP_USE_TLS=false)");
        }

        let op_timeout = Duration::from_secs(config.timeout_secs);
        info!("Conectando ao servidor IMAP {}:{}", config.host, config.port);

        // Conexão TCP com timeout
        let tcp_stream = timeout(
            op_timeout,
            TcpStream::connect((config.host.as_str(), config.port)),
        )
        .await
        .context("Tempo esgotado ao conectar no servidor IMAP")?
        .context("Impossível conectar no servidor IMAP")?;

        // Conexão TLS
        let tls = TlsConnector::new();
        let tls_stream = timeout(op_timeout, tls.connect(&config.host, tcp_stream))
            .await
            .context("Tempo esgotado na negociação TLS")?
            .context("Impossível estabelecer a conexão TLS")?;

        // Cliente IMAP com async-imap
        let client = async_imap::Client::new(tls_stream);

        // Autenticação
        let session = timeout(op_timeout, client.login(&config.username, &config.password))
            .await
            .context("Tempo esgotado na autenticação IMAP")?
            .map_err(|(e, _)| anyhow::anyhow!("Erro de autenticação IMAP: {:?}", e))?;

        info!("Conexão IMAP estabelecida com sucesso");

        Ok(ImapClient {
            session,
            op_timeout,
        })
    }

    /// Busca os UIDs dos emails não lidos, restritos pelos filtros de assunto.
    pub async fn search_unseen(&mut self, filtros_assunto: &[String]) -> Result<Vec<u32>> {
        // Selecionar a caixa de entrada
        timeout(self.op_timeout, self.session.select("INBOX"))
            .await
            .context("Tempo esgotado ao selecionar INBOX")?
            .context("Impossível selecionar INBOX")?;

        let criterio = build_search_query(filtros_assunto);
        debug!("Critério de busca IMAP: {}", criterio);

        let uids = timeout(self.op_timeout, self.session.uid_search(&criterio))
            .await
            .context("Tempo esgotado na busca de emails")?
            .context("Erro na busca de emails não lidos")?;

        // Ordenar para processar na ordem de chegada
        let mut uids: Vec<u32> = uids.into_iter().collect();
        uids.sort_unstable();

        info!("Encontrado(s) {} email(s) não lido(s)", uids.len());
        Ok(uids)
    }

    /// Baixa o conteúdo bruto (RFC822) de um email.
    pub async fn fetch_message(&mut self, uid: u32) -> Result<Vec<u8>> {
        debug!("Baixando email UID {}", uid);

        let fetch_stream = timeout(
            self.op_timeout,
            self.session.uid_fetch(uid.to_string(), "RFC822"),
        )
        .await
        .context("Tempo esgotado ao iniciar o download do email")?
        .context("Impossível baixar o email")?;

        let fetches: Vec<_> = timeout(self.op_timeout, fetch_stream.collect::<Vec<_>>())
            .await
            .context("Tempo esgotado ao baixar o email")?
            .into_iter()
            .filter_map(|r| r.ok())
            .collect();

        if let Some(fetch) = fetches.first() {
            if let Some(body) = fetch.body() {
                debug!("Email UID {} baixado, tamanho: {} bytes", uid, body.len());
                return Ok(body.to_vec());
            }
        }

        anyhow::bail!("Email vazio ou inexistente para o UID {}", uid);
    }

    /// Marca um email como lido (flag \Seen). Chamado uma única vez por
    /// mensagem, depois que todos os anexos foram processados.
    pub async fn mark_seen(&mut self, uid: u32) -> Result<()> {
        debug!("Marcando email UID {} como lido", uid);

        let store_stream = timeout(
            self.op_timeout,
            self.session.uid_store(uid.to_string(), "+FLAGS (\\Seen)"),
        )
        .await
        .context("Tempo esgotado ao marcar o email como lido")?
        .context("Impossível marcar o email como lido")?;

        // Consumir o stream (necessário para que a operação seja efetuada).
        // O servidor pode rejeitar o STORE no meio da resposta, então cada
        // item do stream precisa ser verificado.
        let results: Vec<_> = timeout(self.op_timeout, store_stream.collect::<Vec<_>>())
            .await
            .context("Tempo esgotado ao confirmar a marcação do email como lido")?;
        for result in results {
            result.context("Servidor rejeitou a marcação do email como lido")?;
        }

        info!("✅ Email UID {} marcado como lido", uid);
        Ok(())
    }

    pub async fn logout(mut self) -> Result<()> {
        info!("Desconectando do servidor IMAP");
        match timeout(self.op_timeout, self.session.logout()).await {
            Ok(result) => result.context("Erro ao desconectar do servidor IMAP"),
            Err(_) => {
                warn!("Tempo esgotado ao desconectar; abandonando a conexão");
                Ok(())
            }
        }
    }
}

/// Monta o critério de busca: base UNSEEN, com uma cadeia de OR sobre os
/// filtros de assunto. OR em IMAP é um operador binário prefixado, então
/// três filtros viram `OR SUBJECT "a" OR SUBJECT "b" SUBJECT "c"`.
/// Lista vazia = sem restrição de assunto.
pub fn build_search_query(filtros_assunto: &[String]) -> String {
    let mut criterio = String::from("UNSEEN");
    if !filtros_assunto.is_empty() {
        criterio.push(' ');
        criterio.push_str(&subject_or_chain(filtros_assunto));
    }
    criterio
}

fn subject_or_chain(filtros: &[String]) -> String {
    match filtros {
        [] => String::new(),
        [unico] => format!("SUBJECT \"{}\"", escape_quoted(unico)),
        [primeiro, resto @ ..] => format!(
            "OR SUBJECT \"{}\" {}",
            escape_quoted(primeiro),
            subject_or_chain(resto)
        ),
    }
}

fn escape_quoted(valor: &str) -> String {
    valor.replace('\\', "\\\\").replace('"', "\\\"")
}
