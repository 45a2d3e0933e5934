use anyhow::Result;
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;

mod attachment_parser;
mod cnpj_extractor;
mod config;
mod email_processor;
mod file_router;
mod imap_client;

use config::Config;
use email_processor::EmailProcessor;

#[derive(Parser)]
#[command(name = "nfesort")]
#[command(about = "Baixa anexos XML de NFe via IMAP e organiza as notas por CNPJ do emitente")]
#[command(version = "0.1.0")]
struct Args {
    /// Modo dry-run: analisa os emails sem mover as notas nem marcar como lido
    #[arg(short, long)]
    dry_run: bool,

    /// Modo daemon: executa um ciclo de ingestão a cada intervalo configurado
    #[arg(long)]
    daemon: bool,

    /// Pasta raiz onde as notas são arquivadas (padrão: configuração PASTA_RAIZ)
    #[arg(short = 'o', long)]
    pasta_raiz: Option<PathBuf>,

    /// Limite de emails processados por ciclo (padrão: ilimitado)
    #[arg(short = 'l', long)]
    limit: Option<usize>,

    /// Verificar a configuração sem se conectar
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Carregar o arquivo .env se existir
    dotenv::dotenv().ok();

    // Parsear os argumentos CLI
    let args = Args::parse();

    // Inicializar o logging
    env_logger::init();

    if args.dry_run {
        info!("🧪 Iniciando o nfesort em modo DRY-RUN");
    } else {
        info!("🚀 Iniciando o nfesort");
    }

    // Carregar a configuração
    let mut config = Config::new()?;

    // Substituir a pasta raiz pela dos argumentos CLI se fornecida
    if let Some(pasta_raiz) = &args.pasta_raiz {
        config.download.pasta_raiz = pasta_raiz.clone();
    }

    // Se pedido, verificar somente a configuração
    if args.check_config {
        println!("✅ Configuração válida!");
        println!("📧 Servidor IMAP: {}:{}", config.imap.host, config.imap.port);
        println!("👤 Usuário: {}", config.imap.username);
        println!("📁 Pasta raiz: {:?}", config.download.pasta_raiz);
        println!("🗂️  Pasta temporária: {:?}", config.download.pasta_temporaria());
        println!("🚫 Pasta de inválidos: {:?}", config.download.pasta_invalida());
        if config.filtros_assunto.is_empty() {
            println!("🔎 Filtros de assunto: nenhum (todos os emails não lidos)");
        } else {
            println!("🔎 Filtros de assunto: {:?}", config.filtros_assunto);
        }
        println!("⏱️  Intervalo: {} hora(s)", config.intervalo_horas);
        return Ok(());
    }

    // Se o modo daemon estiver ativado
    if args.daemon {
        info!("🔄 Iniciando em modo daemon");
        run_daemon_mode(config, args).await?;
        return Ok(());
    }

    // Modo one-shot (comportamento padrão)
    let processor = EmailProcessor::new(config);
    match processor.run_cycle(args.limit, args.dry_run).await {
        Ok(report) => {
            info!(
                "✅ Ciclo terminado com sucesso. {} email(s) processado(s), {} nota(s) roteada(s).",
                report.mensagens, report.roteados
            );
        }
        Err(e) => {
            error!("❌ Erro ao processar emails: {:#}", e);
            return Err(e);
        }
    }

    Ok(())
}

async fn run_daemon_mode(config: Config, args: Args) -> Result<()> {
    use tokio::time::{interval, Duration, MissedTickBehavior};

    if config.intervalo_horas == 0 {
        anyhow::bail!("INTERVALO_HORAS deve ser maior que zero no modo daemon");
    }

    info!(
        "📅 Ciclo de ingestão a cada {} hora(s). Ctrl+C para encerrar.",
        config.intervalo_horas
    );

    let mut ticker = interval(Duration::from_secs(config.intervalo_horas * 3600));
    // Um ciclo atrasado não gera rajada de ticks de recuperação
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let processor = EmailProcessor::new(config);

    // Um único listener de Ctrl+C para toda a vida do daemon: um sinal
    // recebido no meio de um ciclo fica pendente no future e é observado
    // na próxima volta do select, depois que o ciclo termina.
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        // O ciclo roda dentro do braço do tick, então dois ciclos nunca se
        // sobrepõem: o próximo tick só é aguardado quando o atual termina.
        tokio::select! {
            _ = ticker.tick() => {
                info!("⏰ Tick do scheduler - processando a caixa de entrada...");
                match processor.run_cycle(args.limit, args.dry_run).await {
                    Ok(report) => {
                        info!(
                            "✅ Ciclo terminado. {} email(s), {} roteada(s), {} inválida(s), {} falha(s)",
                            report.mensagens, report.roteados, report.invalidos, report.falhas
                        );
                    }
                    Err(e) => {
                        // Nenhum erro de ciclo derruba o daemon
                        error!("❌ Erro ao processar emails: {:#}", e);
                    }
                }
            }
            _ = &mut ctrl_c => {
                info!("🛑 Ctrl+C recebido, encerrando o daemon");
                break;
            }
        }
    }

    Ok(())
}
