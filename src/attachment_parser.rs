use anyhow::{Context, Result};
use log::{debug, info, warn};
use mail_parser::{MessageParser, MimeHeaders};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
}

pub struct AttachmentParser;

impl AttachmentParser {
    /// Extrai os anexos XML de um email bruto (RFC822). As partes que não
    /// são XML são ignoradas. Um email que não pode ser parseado gera um
    /// aviso e uma lista vazia, nunca um erro.
    pub fn parse_xml_attachments(raw_email: &[u8]) -> Vec<Attachment> {
        debug!("Parsing do email para extrair os anexos ({} bytes)", raw_email.len());

        let Some(message) = MessageParser::default().parse(raw_email) else {
            warn!("Impossível parsear o email, nenhum anexo extraído");
            return Vec::new();
        };

        let mut attachments = Vec::new();

        for (i, part) in message.attachments().enumerate() {
            let Some(filename) = part.attachment_name() else {
                debug!("Anexo {} sem nome de arquivo, ignorado", i);
                continue;
            };

            // Verificando se o anexo é XML
            if !Self::is_structured_document(filename) {
                debug!("Anexo '{}' não é XML, ignorado", filename);
                continue;
            }

            let content = part.contents();
            debug!("Anexo XML '{}' encontrado: {} bytes", filename, content.len());

            attachments.push(Attachment {
                filename: filename.to_string(),
                content: content.to_vec(),
            });
        }

        info!("Encontrado(s) {} anexo(s) XML", attachments.len());
        attachments
    }

    /// Classificação por sufixo do nome do arquivo, case-insensitive.
    pub fn is_structured_document(filename: &str) -> bool {
        filename.to_lowercase().ends_with(".xml")
    }

    /// Grava um anexo na pasta temporária com o nome original. Em caso de
    /// colisão de nome, um sufixo `-N` é acrescentado; a gravação usa
    /// criação exclusiva, então um arquivo existente nunca é sobrescrito.
    pub fn stage_attachment(attachment: &Attachment, pasta_temporaria: &Path) -> Result<PathBuf> {
        // Descartar componentes de caminho vindos do email
        let nome_seguro = Path::new(&attachment.filename)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "anexo.xml".to_string());

        let (base, extensao) = match nome_seguro.rsplit_once('.') {
            Some((base, ext)) => (base.to_string(), format!(".{}", ext)),
            None => (nome_seguro.clone(), String::new()),
        };

        let mut caminho = pasta_temporaria.join(&nome_seguro);
        let mut tentativa = 0u32;

        loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&caminho)
            {
                Ok(mut arquivo) => {
                    arquivo
                        .write_all(&attachment.content)
                        .with_context(|| format!("Impossível gravar o anexo em {:?}", caminho))?;
                    info!("Arquivo XML {} baixado com sucesso para {:?}", nome_seguro, caminho);
                    return Ok(caminho);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    tentativa += 1;
                    if tentativa > 1000 {
                        anyhow::bail!(
                            "Colisões demais na pasta temporária para o anexo '{}'",
                            nome_seguro
                        );
                    }
                    caminho = pasta_temporaria.join(format!("{}-{}{}", base, tentativa, extensao));
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Impossível criar o arquivo temporário {:?}", caminho)
                    });
                }
            }
        }
    }
}
