use log::{debug, warn};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::Path;

/// Extrai o CNPJ do emitente de uma NFe: o primeiro elemento `CNPJ` que é
/// filho direto de um elemento `emit`, na ordem do documento. Qualquer
/// ambiguidade (arquivo ilegível, XML malformado, elemento ausente, texto
/// em branco) resulta em `None`, nunca em erro.
pub struct CnpjExtractor;

impl CnpjExtractor {
    pub fn extract_from_file(caminho: &Path) -> Option<String> {
        let xml = match std::fs::read_to_string(caminho) {
            Ok(conteudo) => conteudo,
            Err(e) => {
                warn!("Erro ao ler o XML para obter o CNPJ ({:?}): {}", caminho, e);
                return None;
            }
        };

        Self::extract_from_str(&xml)
    }

    pub fn extract_from_str(xml: &str) -> Option<String> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        // Pilha de nomes de elementos abertos, para testar o pai direto.
        // local_name ignora prefixos de namespace (ns:emit == emit).
        let mut pilha: Vec<Vec<u8>> = Vec::new();
        // Profundidade da pilha em que o elemento emit/CNPJ está aberto.
        // Enquanto houver um, todo texto (inclusive de filhos) é coletado.
        let mut nivel_cnpj: Option<usize> = None;
        let mut texto = String::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    let nome = e.local_name().as_ref().to_vec();
                    if nivel_cnpj.is_none()
                        && nome == b"CNPJ"
                        && pilha.last().map(|p| p.as_slice()) == Some(b"emit".as_slice())
                    {
                        nivel_cnpj = Some(pilha.len() + 1);
                    }
                    pilha.push(nome);
                }
                Ok(Event::Empty(ref e)) => {
                    // <CNPJ/> dentro de <emit>: presente mas vazio
                    if nivel_cnpj.is_none()
                        && e.local_name().as_ref() == b"CNPJ"
                        && pilha.last().map(|p| p.as_slice()) == Some(b"emit".as_slice())
                    {
                        debug!("Elemento CNPJ vazio dentro de emit");
                        return None;
                    }
                }
                Ok(Event::End(_)) => {
                    pilha.pop();
                    if nivel_cnpj.is_some_and(|nivel| pilha.len() < nivel) {
                        // Fim do primeiro emit/CNPJ: o valor é o que foi coletado
                        let valor = texto.trim();
                        return if valor.is_empty() {
                            None
                        } else {
                            Some(valor.to_string())
                        };
                    }
                }
                Ok(Event::Text(e)) => {
                    if nivel_cnpj.is_some() {
                        texto.push_str(&e.xml_content().unwrap_or_default());
                    }
                }
                Ok(Event::CData(e)) => {
                    if nivel_cnpj.is_some() {
                        texto.push_str(&String::from_utf8_lossy(&e));
                    }
                }
                Ok(Event::Eof) => {
                    debug!("Nenhum elemento emit/CNPJ encontrado no XML");
                    return None;
                }
                Err(e) => {
                    warn!("Erro ao ler o XML para obter o CNPJ: XML malformado: {}", e);
                    return None;
                }
                _ => {}
            }
        }
    }
}
