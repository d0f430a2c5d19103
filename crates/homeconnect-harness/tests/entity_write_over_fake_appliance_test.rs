//! Exercises `homeconnect-entity`'s `Transport` adapter for
//! `homeconnect_client::Session` against a fake appliance: a write should
//! round-trip through the real session/handshake stack and update the
//! entity's shadow value.

use std::{sync::Arc, time::Duration};

use homeconnect_client::{Mode, Session, SessionConfig};
use homeconnect_entity::{AccessMode, EntityDescription, EntityRuntime, ProtocolType, Tri};
use homeconnect_harness::{ApplianceScript, FakeAppliance, SimEnv};
use turmoil::Builder;

fn power_state_description() -> EntityDescription {
    EntityDescription {
        uid: 7,
        name: "BSH.Common.Setting.PowerState".to_string(),
        protocol_type: Some(ProtocolType::Integer),
        access: Some(AccessMode::ReadWrite),
        available: Tri::True,
        min: None,
        max: None,
        step: None,
        enum_map: None,
        option_uids: Vec::new(),
        execution: homeconnect_entity::Execution::None,
    }
}

#[test]
fn write_through_a_live_session_updates_shadow_value() {
    let mut sim = Builder::new().build();

    sim.host("client", || async {
        let env = SimEnv::with_seed(9);
        let mut script = ApplianceScript::default();
        script.mandatory_value_uid = 7;
        let appliance = FakeAppliance::new(env.clone(), script);

        let mut config = SessionConfig::new("10.0.0.9", "cHNrLWJ5dGVz", Mode::Aes, "ident", "harness-test", "app-id");
        config.keepalive_uid = Some(7);
        let session = Session::new(env, config, Arc::clone(&appliance));
        appliance.attach(session.clone());

        appliance.spontaneous_connect(1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(session.is_connected().await);

        let entity = EntityRuntime::new(power_state_description(), session);
        entity.write(&serde_json::json!(1), Duration::from_secs(1)).await.unwrap();

        assert_eq!(entity.shadow_value().await, Some(serde_json::json!(1)));
        Ok(())
    });

    sim.run().unwrap();
}
