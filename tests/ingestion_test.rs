use nfesort::attachment_parser::Attachment;
use nfesort::config::{Config, DownloadConfig, ImapConfig};
use nfesort::email_processor::EmailProcessor;
use std::fs;
use std::path::Path;

fn test_config(pasta_raiz: &Path) -> Config {
    Config {
        imap: ImapConfig {
            host: "imap.exemplo.com.br".to_string(),
            port: 993,
            use_tls: true,
            username: "fiscal@exemplo.com.br".to_string(),
            password: "segredo".to_string(),
            timeout_secs: 30,
        },
        download: DownloadConfig {
            pasta_raiz: pasta_raiz.to_path_buf(),
            subpasta_temporaria: "temp".to_string(),
            subpasta_invalida: "invalidos".to_string(),
        },
        filtros_assunto: Vec::new(),
        intervalo_horas: 1,
    }
}

fn xml_attachment(filename: &str, cnpj: &str) -> Attachment {
    Attachment {
        filename: filename.to_string(),
        content: format!("<NFe><infNFe><emit><CNPJ>{}</CNPJ></emit></infNFe></NFe>", cnpj)
            .into_bytes(),
    }
}

#[test]
fn test_attachment_with_cnpj_lands_in_cnpj_dir() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = test_config(dir.path());
    let temporaria = config.download.pasta_temporaria();
    fs::create_dir_all(&temporaria).unwrap();

    let processor = EmailProcessor::new(config);
    let report = processor.process_message(&[xml_attachment("nota.xml", "999")], false);

    assert_eq!(report.roteados, 1);
    assert_eq!(report.invalidos, 0);
    assert_eq!(report.falhas, 0);
    assert!(report.teve_anexo_valido);

    // A nota chegou em pasta_raiz/999/nota.xml e a cópia temporária sumiu
    assert!(dir.path().join("999").join("nota.xml").is_file());
    let restante: Vec<_> = fs::read_dir(&temporaria).unwrap().collect();
    assert!(restante.is_empty(), "A pasta temporária deve ficar vazia");

    println!("✅ Nota roteada para {:?}", dir.path().join("999"));
}

#[test]
fn test_attachment_without_cnpj_lands_in_invalid_dir() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = test_config(dir.path());
    fs::create_dir_all(config.download.pasta_temporaria()).unwrap();
    let invalida = config.download.pasta_invalida();

    let anexo = Attachment {
        filename: "sem_cnpj.xml".to_string(),
        content: b"<nota><valor>10</valor></nota>".to_vec(),
    };

    let processor = EmailProcessor::new(config);
    let report = processor.process_message(&[anexo], false);

    assert_eq!(report.roteados, 0);
    assert_eq!(report.invalidos, 1);
    assert!(invalida.join("sem_cnpj.xml").is_file());
}

#[test]
fn test_message_without_xml_attachments_is_reported_not_failed() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = test_config(dir.path());
    fs::create_dir_all(config.download.pasta_temporaria()).unwrap();

    let processor = EmailProcessor::new(config);
    let report = processor.process_message(&[], false);

    assert_eq!(report.roteados, 0);
    assert_eq!(report.invalidos, 0);
    assert_eq!(report.falhas, 0);
    assert!(!report.teve_anexo_valido);
}

#[test]
fn test_one_bad_attachment_does_not_block_siblings() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = test_config(dir.path());
    fs::create_dir_all(config.download.pasta_temporaria()).unwrap();

    let malformada = Attachment {
        filename: "quebrada.xml".to_string(),
        content: b"<emit><CNPJ>123".to_vec(),
    };
    let boa = xml_attachment("boa.xml", "777");

    let processor = EmailProcessor::new(config);
    let report = processor.process_message(&[malformada, boa], false);

    // XML malformado não é falha: roteia para inválidos
    assert_eq!(report.roteados, 1);
    assert_eq!(report.invalidos, 1);
    assert_eq!(report.falhas, 0);
    assert!(dir.path().join("777").join("boa.xml").is_file());
    assert!(dir
        .path()
        .join("invalidos")
        .join("quebrada.xml")
        .is_file());
}

#[test]
fn test_reprocessing_same_message_is_idempotent() {
    // Simula a flag \Seen que falhou: o mesmo email é processado duas vezes
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = test_config(dir.path());
    fs::create_dir_all(config.download.pasta_temporaria()).unwrap();

    let processor = EmailProcessor::new(config);
    let r1 = processor.process_message(&[xml_attachment("nota.xml", "999")], false);
    let r2 = processor.process_message(&[xml_attachment("nota.xml", "999")], false);

    assert_eq!(r1.roteados, 1);
    assert_eq!(r2.roteados, 1, "A segunda passada não deve falhar");
    assert!(dir.path().join("999").join("nota.xml").is_file());
}

#[test]
fn test_failed_move_keeps_attachment_in_staging() {
    // Ocupa o lugar da pasta de destino com um arquivo comum: o move falha
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = test_config(dir.path());
    let temporaria = config.download.pasta_temporaria();
    fs::create_dir_all(&temporaria).unwrap();
    fs::write(dir.path().join("999"), b"nao sou uma pasta").unwrap();

    let processor = EmailProcessor::new(config);
    let report = processor.process_message(&[xml_attachment("nota.xml", "999")], false);

    assert_eq!(report.roteados, 0);
    assert_eq!(report.falhas, 1);

    // Os bytes do anexo continuam recuperáveis na pasta temporária
    assert!(
        temporaria.join("nota.xml").is_file(),
        "A falha no move não pode apagar a cópia temporária"
    );
}

#[test]
fn test_dry_run_leaves_no_files_and_reports_outcome() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = test_config(dir.path());
    let temporaria = config.download.pasta_temporaria();
    fs::create_dir_all(&temporaria).unwrap();

    let processor = EmailProcessor::new(config);
    let report = processor.process_message(&[xml_attachment("nota.xml", "999")], true);

    assert_eq!(report.roteados, 1);
    assert!(
        !dir.path().join("999").join("nota.xml").exists(),
        "Dry-run não deve mover a nota"
    );
    let restante: Vec<_> = fs::read_dir(&temporaria).unwrap().collect();
    assert!(restante.is_empty(), "Dry-run não deve deixar lixo na temporária");
}
