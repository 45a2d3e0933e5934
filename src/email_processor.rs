use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

use crate::attachment_parser::{Attachment, AttachmentParser};
use crate::cnpj_extractor::CnpjExtractor;
use crate::config::Config;
use crate::file_router::{self, RoutingOutcome};
use crate::imap_client::ImapClient;

/// Falha isolada de um anexo. Nunca interrompe os anexos irmãos nem a
/// marcação \Seen do email.
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("falha ao gravar '{filename}' na pasta temporária: {cause:#}")]
    Stage {
        filename: String,
        cause: anyhow::Error,
    },
    #[error("falha ao criar a pasta de destino para '{filename}': {cause:#}")]
    Route {
        filename: String,
        cause: anyhow::Error,
    },
    #[error("falha ao mover '{filename}' para o destino: {cause:#}")]
    Move {
        filename: String,
        cause: anyhow::Error,
    },
}

/// Balanço de um email processado.
#[derive(Debug, Default)]
pub struct PerMessageReport {
    pub roteados: usize,
    pub invalidos: usize,
    pub falhas: usize,
    pub teve_anexo_valido: bool,
}

/// Balanço de um ciclo de ingestão completo.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub mensagens: usize,
    pub mensagens_puladas: usize,
    pub roteados: usize,
    pub invalidos: usize,
    pub falhas: usize,
}

pub struct EmailProcessor {
    config: Config,
}

impl EmailProcessor {
    pub fn new(config: Config) -> Self {
        EmailProcessor { config }
    }

    /// Executa um ciclo completo de ingestão: prepara as pastas, conecta,
    /// busca os emails não lidos, processa cada um e desconecta. O chamador
    /// (modo daemon) captura qualquer erro no limite do ciclo; um ciclo que
    /// falha é tentado de novo no próximo tick.
    pub async fn run_cycle(&self, limit: Option<usize>, dry_run: bool) -> Result<CycleReport> {
        info!("Iniciando o ciclo de ingestão de NFe");

        self.ensure_download_dirs()
            .context("Impossível preparar as pastas de download")?;

        // 1. Conectar no servidor IMAP
        let mut imap_client = ImapClient::connect(&self.config.imap)
            .await
            .context("Impossível se conectar ao servidor IMAP")?;

        // 2. Buscar os emails não lidos (com filtros de assunto)
        let uids = imap_client
            .search_unseen(&self.config.filtros_assunto)
            .await
            .context("Erro na busca de emails")?;

        if uids.is_empty() {
            info!("Nenhum email novo encontrado");
            if let Err(e) = imap_client.logout().await {
                warn!("Erro ao desconectar do servidor IMAP: {:#}", e);
            }
            return Ok(CycleReport::default());
        }

        let uids: Vec<u32> = match limit {
            Some(limite) => uids.into_iter().take(limite).collect(),
            None => uids,
        };

        let mut report = CycleReport::default();

        // 3. Processar cada email encontrado
        for uid in &uids {
            // Falha de download: email pulado, fica não lido para o próximo ciclo
            let raw_email = match imap_client.fetch_message(*uid).await {
                Ok(conteudo) => conteudo,
                Err(e) => {
                    error!("Erro ao baixar o email UID {}: {:#}", uid, e);
                    report.mensagens_puladas += 1;
                    continue;
                }
            };

            let attachments = AttachmentParser::parse_xml_attachments(&raw_email);
            let msg_report = self.process_message(&attachments, dry_run);

            if !msg_report.teve_anexo_valido {
                info!("Nenhum anexo válido encontrado no email UID {}", uid);
            }

            report.mensagens += 1;
            report.roteados += msg_report.roteados;
            report.invalidos += msg_report.invalidos;
            report.falhas += msg_report.falhas;

            // 4. Marcar o email como lido: uma única vez, depois de todos
            // os anexos. Se a flag falhar, o email será reprocessado no
            // próximo ciclo; o roteamento tolera o reprocessamento.
            if dry_run {
                debug!("Dry-run: email UID {} não marcado como lido", uid);
            } else if let Err(e) = imap_client.mark_seen(*uid).await {
                error!("Erro ao marcar o email UID {} como lido: {:#}", uid, e);
            }
        }

        // 5. Desconectar (uma falha aqui não invalida o trabalho já feito)
        if let Err(e) = imap_client.logout().await {
            warn!("Erro ao desconectar do servidor IMAP: {:#}", e);
        }

        info!(
            "Ciclo terminado: {} email(s) processado(s), {} pulado(s), {} nota(s) roteada(s), {} inválida(s), {} falha(s)",
            report.mensagens, report.mensagens_puladas, report.roteados, report.invalidos, report.falhas
        );

        Ok(report)
    }

    /// Processa os anexos XML de um email. Cada anexo é tratado de forma
    /// isolada: uma falha é registrada e contada, os irmãos continuam.
    pub fn process_message(&self, attachments: &[Attachment], dry_run: bool) -> PerMessageReport {
        let mut report = PerMessageReport {
            teve_anexo_valido: !attachments.is_empty(),
            ..Default::default()
        };

        for attachment in attachments {
            match self.process_attachment(attachment, dry_run) {
                Ok(RoutingOutcome::Routed { cnpj, destino }) => {
                    info!(
                        "Arquivo XML {} movido para {:?} (CNPJ {})",
                        attachment.filename, destino, cnpj
                    );
                    report.roteados += 1;
                }
                Ok(RoutingOutcome::Unrouted { motivo, destino }) => {
                    warn!(
                        "Arquivo XML {} sem CNPJ identificável ({}), movido para {:?}",
                        attachment.filename, motivo, destino
                    );
                    report.invalidos += 1;
                }
                Err(e) => {
                    error!("Erro ao processar o anexo '{}': {}", attachment.filename, e);
                    report.falhas += 1;
                }
            }
        }

        report
    }

    /// Pipeline de um anexo: gravar na pasta temporária, extrair o CNPJ,
    /// decidir o destino e mover. Em dry-run o arquivo temporário é
    /// removido em vez de movido.
    fn process_attachment(
        &self,
        attachment: &Attachment,
        dry_run: bool,
    ) -> Result<RoutingOutcome, AttachmentError> {
        let pasta_temporaria = self.config.download.pasta_temporaria();

        // 1. Salvar o anexo na pasta temporária
        let caminho_temporario = AttachmentParser::stage_attachment(attachment, &pasta_temporaria)
            .map_err(|e| AttachmentError::Stage {
                filename: attachment.filename.clone(),
                cause: e,
            })?;

        // 2. Ler o XML para obter o CNPJ (None em caso de qualquer problema)
        let cnpj = CnpjExtractor::extract_from_file(&caminho_temporario);

        // 3. Decidir e criar a pasta de destino
        let pasta_destino = match file_router::route(
            &self.config.download.pasta_raiz,
            &self.config.download.pasta_invalida(),
            cnpj.as_deref(),
        ) {
            Ok(pasta) => pasta,
            Err(e) => {
                // O arquivo fica na pasta temporária: são os únicos bytes
                // que ainda temos desse anexo.
                return Err(AttachmentError::Route {
                    filename: attachment.filename.clone(),
                    cause: e,
                });
            }
        };

        if dry_run {
            info!(
                "🧪 Dry-run: '{}' iria para {:?}",
                attachment.filename, pasta_destino
            );
            let _ = fs::remove_file(&caminho_temporario);
            return Ok(self.outcome_for(cnpj, pasta_destino));
        }

        // 4. Mover o arquivo XML para a pasta de destino
        if let Err(e) = file_router::move_into(&caminho_temporario, &pasta_destino) {
            // Também aqui o arquivo permanece na pasta temporária.
            return Err(AttachmentError::Move {
                filename: attachment.filename.clone(),
                cause: e,
            });
        }

        Ok(self.outcome_for(cnpj, pasta_destino))
    }

    fn outcome_for(&self, cnpj: Option<String>, destino: PathBuf) -> RoutingOutcome {
        match cnpj {
            Some(cnpj) if destino != self.config.download.pasta_invalida() => {
                RoutingOutcome::Routed { cnpj, destino }
            }
            Some(_) => RoutingOutcome::Unrouted {
                motivo: "CNPJ inutilizável como nome de pasta".to_string(),
                destino,
            },
            None => RoutingOutcome::Unrouted {
                motivo: "CNPJ ausente ou XML ilegível".to_string(),
                destino,
            },
        }
    }

    /// Cria as pastas temporária e de inválidos se não existirem.
    fn ensure_download_dirs(&self) -> Result<()> {
        let pasta_temporaria = self.config.download.pasta_temporaria();
        let pasta_invalida = self.config.download.pasta_invalida();

        if !pasta_invalida.exists() {
            fs::create_dir_all(&pasta_invalida)
                .with_context(|| format!("Impossível criar {:?}", pasta_invalida))?;
            info!("Pasta para arquivos inválidos criada em {:?}", pasta_invalida);
        }

        if !pasta_temporaria.exists() {
            fs::create_dir_all(&pasta_temporaria)
                .with_context(|| format!("Impossível criar {:?}", pasta_temporaria))?;
            info!("Pasta para arquivos temporários criada em {:?}", pasta_temporaria);
        }

        Ok(())
    }
}
