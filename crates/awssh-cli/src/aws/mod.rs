//! AWS-backed control plane
//!
//! EC2 resolves and snapshots instances, SSM brokers the port-forwarding
//! session, and EC2 Instance Connect accepts the short-lived public key.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_ec2::types::{Filter, Instance, InstanceStateName, ResourceType, Tag, TagSpecification};

use awssh_core::forwarding::DOCUMENT_NAME;
use awssh_core::traits::ControlPlane;
use awssh_core::{ControlPlaneError, ForwardingParameters, Target, TargetId, TokenBundle};

/// Tag holding an instance's display name
const NAME_TAG: &str = "Name";

/// Value of the `Created` tag on images this tool makes
const CREATED_BY: &str = "awssh";

/// Control plane backed by the AWS SDK
pub struct AwsControlPlane {
    ec2: aws_sdk_ec2::Client,
    ssm: aws_sdk_ssm::Client,
    instance_connect: aws_sdk_ec2instanceconnect::Client,
    region: String,
}

impl AwsControlPlane {
    /// Load shared configuration for `profile` and build the service clients
    pub async fn connect(profile: &str) -> Result<Self> {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .profile_name(profile)
            .load()
            .await;

        let region = sdk_config
            .region()
            .map(|region| region.to_string())
            .with_context(|| format!("No region configured for profile '{}'", profile))?;

        tracing::debug!(profile, region = %region, "Loaded AWS configuration");

        Ok(Self {
            ec2: aws_sdk_ec2::Client::new(&sdk_config),
            ssm: aws_sdk_ssm::Client::new(&sdk_config),
            instance_connect: aws_sdk_ec2instanceconnect::Client::new(&sdk_config),
            region,
        })
    }
}

#[async_trait]
impl ControlPlane for AwsControlPlane {
    async fn resolve_target(&self, id: &TargetId) -> Result<Target, ControlPlaneError> {
        let output = self
            .ec2
            .describe_instances()
            .instance_ids(id.as_str())
            .send()
            .await
            .map_err(|e| match e.code() {
                Some(code) if code.starts_with("InvalidInstanceID") => {
                    ControlPlaneError::NotFound(id.to_string())
                }
                _ => request_error("DescribeInstances", &e),
            })?;

        let instances: Vec<&Instance> = output
            .reservations()
            .iter()
            .flat_map(|reservation| reservation.instances())
            .collect();

        match instances.as_slice() {
            [] => Err(ControlPlaneError::NotFound(id.to_string())),
            [instance] => {
                let target = to_target(instance)
                    .ok_or_else(|| ControlPlaneError::NotFound(id.to_string()))?;
                if target.placement.is_none() {
                    return Err(ControlPlaneError::Request(format!(
                        "{} has no availability zone",
                        id
                    )));
                }
                Ok(target)
            }
            _ => Err(ControlPlaneError::Ambiguous(id.to_string())),
        }
    }

    async fn list_targets(&self) -> Result<Vec<Target>, ControlPlaneError> {
        let running = Filter::builder()
            .name("instance-state-name")
            .values(InstanceStateName::Running.as_str())
            .build();

        let mut targets = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .ec2
                .describe_instances()
                .filters(running.clone())
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| request_error("DescribeInstances", &e))?;

            targets.extend(
                output
                    .reservations()
                    .iter()
                    .flat_map(|reservation| reservation.instances())
                    .filter_map(to_target),
            );

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        tracing::debug!(count = targets.len(), "Listed running instances");
        Ok(targets)
    }

    async fn start_forwarding_session(
        &self,
        target: &Target,
        remote_port: u16,
        local_port: u16,
    ) -> Result<(TokenBundle, ForwardingParameters), ControlPlaneError> {
        let parameters = ForwardingParameters::new(target.id.clone(), remote_port, local_port);

        let mut request = self
            .ssm
            .start_session()
            .target(target.id.as_str())
            .document_name(DOCUMENT_NAME);
        for (key, values) in parameters.request_parameters() {
            request = request.parameters(key, values);
        }

        let output = request
            .send()
            .await
            .map_err(|e| match e.code() {
                Some("TargetNotConnected") => ControlPlaneError::Rejected(format!(
                    "{} is not connected to Session Manager",
                    target.id
                )),
                _ => request_error("StartSession", &e),
            })?;

        let field = |value: Option<&str>, name: &str| {
            value
                .map(str::to_string)
                .ok_or_else(|| ControlPlaneError::Request(format!("StartSession returned no {}", name)))
        };

        let token = TokenBundle {
            session_id: field(output.session_id(), "SessionId")?,
            token_value: field(output.token_value(), "TokenValue")?,
            stream_url: field(output.stream_url(), "StreamUrl")?,
        };

        Ok((token, parameters))
    }

    async fn push_credential(
        &self,
        target: &Target,
        username: &str,
        public_key: &str,
    ) -> Result<(), ControlPlaneError> {
        let zone = target.placement.as_deref().ok_or_else(|| {
            ControlPlaneError::Request(format!("{} has no availability zone", target.id))
        })?;

        let output = self
            .instance_connect
            .send_ssh_public_key()
            .instance_id(target.id.as_str())
            .instance_os_user(username)
            .ssh_public_key(public_key)
            .availability_zone(zone)
            .send()
            .await
            .map_err(|e| request_error("SendSSHPublicKey", &e))?;

        if !output.success() {
            return Err(ControlPlaneError::Rejected(
                "SendSSHPublicKey request unsuccessful".to_string(),
            ));
        }

        tracing::debug!(target_id = %target.id, "SendSSHPublicKey accepted");
        Ok(())
    }

    async fn create_snapshot(&self, target: &Target) -> Result<String, ControlPlaneError> {
        let id = target.id.as_str();
        let tags = TagSpecification::builder()
            .resource_type(ResourceType::Image)
            .tags(Tag::builder().key("instance-id").value(id).build())
            .tags(Tag::builder().key("Created").value(CREATED_BY).build())
            .build();

        let output = self
            .ec2
            .create_image()
            .instance_id(id)
            .name(snapshot_name(id, chrono::Local::now()))
            .description(snapshot_description(id))
            .no_reboot(true)
            .tag_specifications(tags)
            .send()
            .await
            .map_err(|e| request_error("CreateImage", &e))?;

        output
            .image_id()
            .map(str::to_string)
            .ok_or_else(|| ControlPlaneError::Request("CreateImage returned no ImageId".to_string()))
    }

    fn region(&self) -> &str {
        &self.region
    }

    fn endpoint_url(&self) -> String {
        ssm_endpoint(&self.region)
    }
}

fn request_error<E: std::error::Error>(operation: &str, e: &E) -> ControlPlaneError {
    ControlPlaneError::Request(format!("{} failed: {}", operation, DisplayErrorContext(e)))
}

/// Build a target from an instance description
fn to_target(instance: &Instance) -> Option<Target> {
    let id = TargetId::parse(instance.instance_id()?).ok()?;
    let mut target = Target::new(id);

    if let Some(name) = instance
        .tags()
        .iter()
        .find(|tag| tag.key() == Some(NAME_TAG))
        .and_then(|tag| tag.value())
    {
        target = target.with_name(name);
    }

    if let Some(zone) = instance
        .placement()
        .and_then(|placement| placement.availability_zone())
    {
        target = target.with_placement(zone);
    }

    Some(target)
}

/// Control-plane URL handed to the tunnel helper
pub fn ssm_endpoint(region: &str) -> String {
    format!("https://ssm.{}.amazonaws.com", region)
}

/// Image name: `<instance>_<YYYYmmddHHMMSS>`
pub fn snapshot_name<Tz>(instance_id: &str, now: chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("{}_{}", instance_id, now.format("%Y%m%d%H%M%S"))
}

pub fn snapshot_description(instance_id: &str) -> String {
    format!(
        "Created by awssh command to auto snapshot. [{}]",
        instance_id
    )
}
