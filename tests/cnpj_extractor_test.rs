use nfesort::cnpj_extractor::CnpjExtractor;
use std::fs;
use std::path::Path;

#[test]
fn test_extract_simple_emit_cnpj() {
    let xml = "<emit><CNPJ>12345</CNPJ></emit>";
    assert_eq!(
        CnpjExtractor::extract_from_str(xml),
        Some("12345".to_string())
    );
}

#[test]
fn test_extract_from_nested_nfe_document() {
    // Estrutura real de uma NFe: emit enterrado dentro de nfeProc/NFe/infNFe
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe" versao="4.00">
  <NFe>
    <infNFe versao="4.00">
      <emit>
        <CNPJ>14200166000187</CNPJ>
        <xNome>Comercial Exemplo Ltda</xNome>
      </emit>
      <dest>
        <CNPJ>99999999000191</CNPJ>
      </dest>
    </infNFe>
  </NFe>
</nfeProc>"#;

    // O CNPJ do destinatário não pode ser confundido com o do emitente
    assert_eq!(
        CnpjExtractor::extract_from_str(xml),
        Some("14200166000187".to_string())
    );
}

#[test]
fn test_cnpj_outside_emit_is_ignored() {
    let xml = "<nota><dest><CNPJ>111</CNPJ></dest></nota>";
    assert_eq!(CnpjExtractor::extract_from_str(xml), None);
}

#[test]
fn test_missing_emit_returns_none() {
    let xml = "<nota><valor>100.00</valor></nota>";
    assert_eq!(CnpjExtractor::extract_from_str(xml), None);
}

#[test]
fn test_malformed_xml_returns_none_without_panicking() {
    // Truncado no meio do valor
    let xml = "<emit><CNPJ>123";
    assert_eq!(CnpjExtractor::extract_from_str(xml), None);

    // Tag de fechamento errada
    let xml = "<emit><CNPJ>123</XXX></emit>";
    assert_eq!(CnpjExtractor::extract_from_str(xml), None);

    let xml = "isto não é XML <<<>>>";
    assert_eq!(CnpjExtractor::extract_from_str(xml), None);
}

#[test]
fn test_empty_and_whitespace_cnpj_return_none() {
    assert_eq!(CnpjExtractor::extract_from_str("<emit><CNPJ/></emit>"), None);
    assert_eq!(
        CnpjExtractor::extract_from_str("<emit><CNPJ>   </CNPJ></emit>"),
        None
    );
}

#[test]
fn test_first_emit_without_cnpj_falls_through_to_next() {
    // Mesmo comportamento de Descendants("emit").Elements("CNPJ").First():
    // o primeiro CNPJ filho de um emit, na ordem do documento
    let xml = "<lote><emit><xNome>Sem CNPJ</xNome></emit><emit><CNPJ>777</CNPJ></emit></lote>";
    assert_eq!(
        CnpjExtractor::extract_from_str(xml),
        Some("777".to_string())
    );
}

#[test]
fn test_child_elements_inside_cnpj_are_flattened() {
    // Semântica de XElement.Value: concatena todo o texto descendente,
    // então marcação espúria dentro do CNPJ não aborta a extração
    let xml = "<emit><CNPJ><b>1</b></CNPJ></emit>";
    assert_eq!(CnpjExtractor::extract_from_str(xml), Some("1".to_string()));

    let xml = "<emit><CNPJ>14200166<b>0001</b>87</CNPJ></emit>";
    assert_eq!(
        CnpjExtractor::extract_from_str(xml),
        Some("14200166000187".to_string())
    );
}

#[test]
fn test_namespace_prefix_is_ignored() {
    let xml = r#"<ns:emit xmlns:ns="http://example.com"><ns:CNPJ>42</ns:CNPJ></ns:emit>"#;
    assert_eq!(CnpjExtractor::extract_from_str(xml), Some("42".to_string()));
}

#[test]
fn test_extract_from_file() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let caminho = dir.path().join("nota.xml");
    fs::write(&caminho, "<emit><CNPJ>14200166000187</CNPJ></emit>")
        .expect("Failed to write test XML");

    assert_eq!(
        CnpjExtractor::extract_from_file(&caminho),
        Some("14200166000187".to_string())
    );

    println!("✅ CNPJ extraído do arquivo: 14200166000187");
}

#[test]
fn test_unreadable_file_returns_none() {
    let caminho = Path::new("/caminho/que/nao/existe/nota.xml");
    assert_eq!(CnpjExtractor::extract_from_file(caminho), None);
}
