use anyhow::{Context, Result};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

/// Resultado do roteamento de um anexo.
#[derive(Debug)]
pub enum RoutingOutcome {
    /// Nota arquivada na pasta do CNPJ do emitente
    Routed { cnpj: String, destino: PathBuf },
    /// Nota sem CNPJ identificável, arquivada na pasta de inválidos
    Unrouted { motivo: String, destino: PathBuf },
}

/// Decide a pasta de destino de uma nota: CNPJ presente e utilizável como
/// nome de pasta vai para `pasta_raiz/<cnpj>`, senão para a pasta de
/// inválidos. A pasta é criada se não existir (idempotente).
pub fn route(pasta_raiz: &Path, pasta_invalida: &Path, cnpj: Option<&str>) -> Result<PathBuf> {
    let destino = match cnpj.map(str::trim) {
        Some(valor) if !valor.is_empty() && is_safe_dir_name(valor) => pasta_raiz.join(valor),
        Some(valor) if !valor.is_empty() => {
            // Identificadores com separadores de caminho não viram pasta
            debug!("CNPJ '{}' inutilizável como nome de pasta", valor);
            pasta_invalida.to_path_buf()
        }
        _ => pasta_invalida.to_path_buf(),
    };

    if !destino.exists() {
        fs::create_dir_all(&destino)
            .with_context(|| format!("Impossível criar a pasta de destino {:?}", destino))?;
        info!("Pasta de destino criada em {:?}", destino);
    }

    Ok(destino)
}

/// Move um arquivo da pasta temporária para a pasta de destino. Rename
/// atômico quando possível, senão cópia + remoção (outro dispositivo).
/// Um arquivo já existente no destino é sobrescrito, o que torna o
/// reprocessamento de um email (flag \Seen que falhou) inofensivo.
pub fn move_into(origem: &Path, pasta_destino: &Path) -> Result<PathBuf> {
    let nome = origem
        .file_name()
        .context("Caminho de origem sem nome de arquivo")?;
    let destino = pasta_destino.join(nome);

    if fs::rename(origem, &destino).is_err() {
        fs::copy(origem, &destino)
            .with_context(|| format!("Impossível copiar {:?} para {:?}", origem, destino))?;
        fs::remove_file(origem)
            .with_context(|| format!("Impossível remover o arquivo temporário {:?}", origem))?;
    }

    Ok(destino)
}

fn is_safe_dir_name(valor: &str) -> bool {
    valor != "." && valor != ".." && !valor.contains('/') && !valor.contains('\\')
}
