//! Controle de recursão paralela (fork/join com orçamento de profundidade)
//!
//! Every tree walk that descends into both children goes through
//! [`fork_join`]. While the budget is positive the first half runs on a scoped
//! worker and the second on the calling thread; both halves receive
//! `par_depth - 1`. At zero the walk is plain depth-first. The join is the only
//! suspension point.

use crate::config;

/// Orçamento padrão lido da configuração
pub fn default_par_depth() -> u32 {
    if is_enabled() {
        *config::PARALLEL_DEPTH
    } else {
        0
    }
}

/// Fork/join disponível (feature `parallel` e toggle de ambiente)
#[inline]
pub fn is_enabled() -> bool {
    cfg!(feature = "parallel") && *config::PARALLEL_ENABLED
}

/// Executa `a` e `b`, em paralelo enquanto houver orçamento
pub fn fork_join<A, B, RA, RB>(par_depth: u32, a: A, b: B) -> (RA, RB)
where
    A: FnOnce(u32) -> RA + Send,
    B: FnOnce(u32) -> RB + Send,
    RA: Send,
    RB: Send,
{
    if par_depth == 0 || !is_enabled() {
        return (a(0), b(0));
    }
    fork(par_depth - 1, a, b)
}

#[cfg(feature = "parallel")]
fn fork<A, B, RA, RB>(next: u32, a: A, b: B) -> (RA, RB)
where
    A: FnOnce(u32) -> RA + Send,
    B: FnOnce(u32) -> RB + Send,
    RA: Send,
    RB: Send,
{
    tracing::trace!(remaining = next, "fork");
    let joined = crossbeam_utils::thread::scope(|s| {
        let handle = s.spawn(move |_| a(next));
        let rb = b(next);
        let ra = match handle.join() {
            Ok(ra) => ra,
            Err(payload) => std::panic::resume_unwind(payload),
        };
        (ra, rb)
    });
    match joined {
        Ok(pair) => pair,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

#[cfg(not(feature = "parallel"))]
fn fork<A, B, RA, RB>(next: u32, a: A, b: B) -> (RA, RB)
where
    A: FnOnce(u32) -> RA + Send,
    B: FnOnce(u32) -> RB + Send,
    RA: Send,
    RB: Send,
{
    (a(next), b(next))
}

/// Junta dois resultados falíveis, preferindo o erro do primeiro ramo
pub fn try_fork_join<A, B, E>(par_depth: u32, a: A, b: B) -> Result<(), E>
where
    A: FnOnce(u32) -> Result<(), E> + Send,
    B: FnOnce(u32) -> Result<(), E> + Send,
    E: Send,
{
    let (ra, rb) = fork_join(par_depth, a, b);
    ra.and(rb)
}
