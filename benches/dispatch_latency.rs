use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use tokio::runtime::Runtime;

use guardr::attribution::ActorResolver;
use guardr::counter::{counter_key, RateWindowCounter};
use guardr::dispatch::GuardDispatcher;
use guardr::domain::{
    ActionEvent, ActionKind, AuditEntry, GuardConfig, GuardKind, GuildId, ProtectionPolicy,
    TargetId, UserId,
};
use guardr::evaluator::PolicyEvaluator;
use guardr::observability::MetricsRegistry;
use guardr::platform::{Member, MockPlatform};
use guardr::remediation::RemediationEngine;
use guardr::store::{ConfigStore, MemoryPersistence};

fn create_test_event(subject: &str) -> ActionEvent {
    ActionEvent::new(
        GuildId::new("G_BENCH"),
        TargetId::new(subject),
        ActionKind::RoleCreate {
            name: "squad".to_string(),
        },
    )
}

fn armed_role_policy(role_create_threshold: u32) -> ProtectionPolicy {
    let mut policy = ProtectionPolicy::disarmed();
    policy.version = "bench".to_string();

    let mut role_guard = GuardConfig::enabled();
    role_guard
        .thresholds
        .insert("roleCreate".to_string(), role_create_threshold);
    policy.guards.insert(GuardKind::RoleGuard, role_guard);
    policy
}

fn build_dispatcher(
    rt: &Runtime,
    policy: ProtectionPolicy,
    platform: Arc<MockPlatform>,
) -> GuardDispatcher {
    let persistence = Arc::new(MemoryPersistence::with_policy(policy));
    let store = Arc::new(rt.block_on(ConfigStore::bootstrap(persistence)));

    let counters = Arc::new(RateWindowCounter::new());
    let metrics = Arc::new(MetricsRegistry::new());
    let resolver = ActorResolver::new(platform.clone(), 15_000);
    let evaluator = PolicyEvaluator::new(counters, platform.clone());
    let remediation = RemediationEngine::new(platform.clone());

    GuardDispatcher::new(
        store,
        resolver,
        evaluator,
        remediation,
        platform,
        metrics,
        true,
    )
}

fn bench_counter_increment(c: &mut Criterion) {
    let counters = RateWindowCounter::new();

    // Pre-populate with some actors
    for i in 0..1000 {
        let key = counter_key(GuardKind::RoleGuard, "roleDelete", &format!("U{}", i));
        counters.increment(&key, 3_600_000);
    }

    c.bench_function("counter_increment_existing", |b| {
        let mut i = 0u32;
        b.iter(|| {
            let key = counter_key(GuardKind::RoleGuard, "roleDelete", &format!("U{}", i % 1000));
            i = i.wrapping_add(1);
            counters.increment(black_box(&key), 3_600_000)
        })
    });

    c.bench_function("counter_increment_new", |b| {
        let mut i = 1000u32;
        b.iter(|| {
            let key = counter_key(GuardKind::RoleGuard, "roleDelete", &format!("newU{}", i));
            i = i.wrapping_add(1);
            counters.increment(black_box(&key), 3_600_000)
        })
    });
}

fn bench_counter_sweep(c: &mut Criterion) {
    let counters = RateWindowCounter::new();

    for i in 0..1000 {
        let key = counter_key(GuardKind::MemberGuard, "banAdd", &format!("U{}", i));
        counters.increment(&key, 3_600_000);
    }

    c.bench_function("counter_sweep_live_entries", |b| {
        b.iter(|| counters.sweep())
    });
}

fn bench_threshold_resolution(c: &mut Criterion) {
    let policy = armed_role_policy(2);
    let delete = ActionKind::RoleDelete {
        name: "mods".to_string(),
    };
    let ban = ActionKind::BanAdd;

    c.bench_function("threshold_guard_override", |b| {
        b.iter(|| policy.threshold_for(GuardKind::RoleGuard, black_box(&delete)))
    });

    c.bench_function("threshold_builtin_fallback", |b| {
        b.iter(|| policy.threshold_for(GuardKind::MemberGuard, black_box(&ban)))
    });
}

fn bench_attribution_resolve(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let platform = Arc::new(MockPlatform::new());

    let event = create_test_event("R_NEW");
    platform.set_audit_entry(
        "roleCreate",
        AuditEntry {
            entry_id: "E1".to_string(),
            actor_id: UserId::new("U1"),
            target_id: Some(TargetId::new("R_NEW")),
            created_at: event.observed_at,
        },
    );

    let resolver = ActorResolver::new(platform, 15_000);

    c.bench_function("attribution_resolve_exact", |b| {
        b.to_async(&rt).iter(|| resolver.resolve(black_box(&event)))
    });
}

fn bench_dispatch_counted(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let platform = Arc::new(MockPlatform::new());

    let event = create_test_event("R_NEW");
    platform.set_audit_entry(
        "roleCreate",
        AuditEntry {
            entry_id: "E1".to_string(),
            actor_id: UserId::new("U1"),
            target_id: Some(TargetId::new("R_NEW")),
            created_at: event.observed_at,
        },
    );
    platform.add_member(Member::new(UserId::new("U1")));

    // Threshold high enough that the window never breaches mid-run
    let dispatcher = build_dispatcher(&rt, armed_role_policy(u32::MAX), platform);

    c.bench_function("dispatch_counted", |b| {
        b.to_async(&rt)
            .iter(|| dispatcher.dispatch(black_box(event.clone())))
    });
}

fn bench_dispatch_disabled_guard(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let platform = Arc::new(MockPlatform::new());

    let event = create_test_event("R_NEW");
    let dispatcher = build_dispatcher(&rt, ProtectionPolicy::disarmed(), platform);

    c.bench_function("dispatch_disabled_guard", |b| {
        b.to_async(&rt)
            .iter(|| dispatcher.dispatch(black_box(event.clone())))
    });
}

criterion_group!(
    benches,
    bench_counter_increment,
    bench_counter_sweep,
    bench_threshold_resolution,
    bench_attribution_resolve,
    bench_dispatch_counted,
    bench_dispatch_disabled_guard,
);

criterion_main!(benches);
