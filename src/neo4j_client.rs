use crate::config::AppConfig;
use anyhow::{Context, Result};
use neo4rs::{query, Graph};
use tracing::info;
use url::Url;

/// Dirección `host:puerto` del servidor Bolt a partir de `NEO4J_URI`
/// (`bolt://`, `neo4j://`...). Sin puerto se usa el 7687.
fn bolt_address(uri: &str) -> Result<String> {
    let url = Url::parse(uri).with_context(|| format!("NEO4J_URI inválida: '{uri}'"))?;
    let host = url.host_str().unwrap_or("localhost");
    let port = url.port().unwrap_or(7687);
    Ok(format!("{host}:{port}"))
}

/// Conecta con la base Neo4j que guarda los nodos `:Question` y su índice vectorial.
pub async fn connect_from_config(cfg: &AppConfig) -> Result<Graph> {
    let addr = bolt_address(&cfg.neo4j_uri)?;

    info!("Conectando a Neo4j (banco de preguntas) en {addr}...");
    let graph = Graph::new(&addr, &cfg.neo4j_user, &cfg.neo4j_password).await?;
    info!("Conexión a Neo4j OK");
    Ok(graph)
}

/// Crea el constraint de unicidad de :Question(id), que hace que el upsert por id
/// sea un MERGE sobre un nodo único.
pub async fn ensure_schema(graph: &Graph) -> Result<()> {
    graph
        .run(query(
            "CREATE CONSTRAINT question_id IF NOT EXISTS
             FOR (q:Question)
             REQUIRE q.id IS UNIQUE",
        ))
        .await?;

    info!("Esquema de Neo4j asegurado (constraint de :Question creado).");
    Ok(())
}
